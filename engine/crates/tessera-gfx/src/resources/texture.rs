use std::rc::Rc;

use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::{GfxFormat, NativeFootprint, NativeResourceDesc, NativeShaderResourceViewDesc};
use crate::resources::placed_resource::GfxPlacedResource;
use crate::resources::resource::GfxResource;
use crate::resources::resource_state::{GfxCpuAccess, GfxResourceKind, GfxTextureKind};

/// 单个 mip 的 texture，放置在 Textures 类别的 heap 中
///
/// 原生资源在第一次访问时才创建
pub struct GfxTexture {
    resource: GfxPlacedResource,

    kind: GfxTextureKind,
    width: u32,
    height: u32,
    depth: u16,
    format: GfxFormat,
}

// new & init
impl GfxTexture {
    /// 1D texture 的 `height`/`depth` 必须为 1，2D texture 的 `depth` 必须为 1
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core: &Rc<GfxDeviceCore>,
        kind: GfxTextureKind,
        cpu_access: GfxCpuAccess,
        width: u32,
        height: u32,
        depth: u16,
        format: GfxFormat,
        name: impl Into<String>,
    ) -> GfxResult<Self> {
        core.ensure_alive()?;
        if width == 0 || height == 0 || depth == 0 {
            return Err(GfxError::invalid_argument(
                "extent",
                format!("texture extent {width}x{height}x{depth} must not be empty"),
            ));
        }
        match kind {
            GfxTextureKind::OneDimensional if height != 1 || depth != 1 => {
                return Err(GfxError::invalid_argument("extent", "1D texture requires height == 1 and depth == 1"));
            }
            GfxTextureKind::TwoDimensional if depth != 1 => {
                return Err(GfxError::invalid_argument("extent", "2D texture requires depth == 1"));
            }
            _ => (),
        }
        let bytes_per_element = format.bytes_per_element();
        if bytes_per_element == 0 {
            return Err(GfxError::invalid_argument("format", format!("{format:?} is not a texture format")));
        }

        let byte_size = width as u64 * height as u64 * depth as u64 * bytes_per_element as u64;
        Ok(Self {
            resource: GfxPlacedResource::new(
                core,
                "GfxTexture",
                GfxResourceKind::Texture(kind),
                cpu_access,
                NativeResourceDesc::texture(kind.dimension(), width, height, depth, format),
                byte_size,
                name.into(),
            ),
            kind,
            width,
            height,
            depth,
            format,
        })
    }
}

// getters
impl GfxTexture {
    #[inline]
    pub fn kind(&self) -> GfxTextureKind {
        self.kind
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> u16 {
        self.depth
    }

    #[inline]
    pub fn format(&self) -> GfxFormat {
        self.format
    }

    /// 以 buffer 作为拷贝源时，texture 数据在 buffer 中的线性布局
    pub fn footprint(&self) -> GfxResult<NativeFootprint> {
        self.resource.ensure_alive()?;
        let core = self.resource.core();
        core.driver().copyable_footprint(core.device()?, self.resource.desc()).or_external("GetCopyableFootprints")
    }

    #[inline]
    pub fn srv_desc(&self) -> NativeShaderResourceViewDesc {
        NativeShaderResourceViewDesc {
            format: self.format,
            dimension: self.kind.dimension(),
            mip_levels: 1,
        }
    }
}

impl GfxResource for GfxTexture {
    #[inline]
    fn placed(&self) -> &GfxPlacedResource {
        &self.resource
    }
}
