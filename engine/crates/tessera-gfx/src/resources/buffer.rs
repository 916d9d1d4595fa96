use std::rc::Rc;

use crate::error::{GfxError, GfxResult};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::NativeResourceDesc;
use crate::resources::placed_resource::GfxPlacedResource;
use crate::resources::resource::GfxResource;
use crate::resources::resource_state::{GfxBufferKind, GfxCpuAccess, GfxResourceKind};

/// 线性的 buffer，放置在 Buffers 类别的 heap 中
///
/// 原生资源在第一次访问时才创建
///
/// # Destroy
/// drop 时自动 dispose
pub struct GfxBuffer {
    resource: GfxPlacedResource,

    kind: GfxBufferKind,
    size: u64,
    /// 每个元素的字节数；0 表示没有元素结构
    stride: u32,
}

// new & init
impl GfxBuffer {
    pub fn new(
        core: &Rc<GfxDeviceCore>,
        kind: GfxBufferKind,
        cpu_access: GfxCpuAccess,
        size: u64,
        stride: u32,
        name: impl Into<String>,
    ) -> GfxResult<Self> {
        core.ensure_alive()?;
        if size == 0 {
            return Err(GfxError::invalid_argument("size", "buffer size must not be zero"));
        }
        if matches!(kind, GfxBufferKind::Vertex | GfxBufferKind::Index) && stride == 0 {
            return Err(GfxError::invalid_argument("stride", format!("{kind:?} buffer requires a stride")));
        }
        if stride != 0 && size % stride as u64 != 0 {
            return Err(GfxError::invalid_argument(
                "stride",
                format!("size {size} is not a multiple of stride {stride}"),
            ));
        }

        Ok(Self {
            resource: GfxPlacedResource::new(
                core,
                "GfxBuffer",
                GfxResourceKind::Buffer(kind),
                cpu_access,
                NativeResourceDesc::buffer(size),
                size,
                name.into(),
            ),
            kind,
            size,
            stride,
        })
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn kind(&self) -> GfxBufferKind {
        self.kind
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn gpu_address(&self) -> GfxResult<u64> {
        self.resource.gpu_address()
    }
}

impl GfxResource for GfxBuffer {
    #[inline]
    fn placed(&self) -> &GfxPlacedResource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeHandle, ResourceState};
    use crate::test_utils::null_core;

    #[test]
    fn test_native_resource_created_once() {
        let (null, core) = null_core();
        let buffer = GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 1024, 16, "vb").unwrap();
        assert_eq!(null.call_count("CreatePlacedResource"), 0);
        assert_eq!(buffer.region_offset(), None);

        let first = buffer.native_resource().unwrap();
        let second = buffer.native_resource().unwrap();
        assert_eq!(first, second);
        assert_eq!(null.call_count("CreatePlacedResource"), 1);
        assert_eq!(buffer.region_offset(), Some(0));
    }

    #[test]
    fn test_default_state_is_cached() {
        let (null, core) = null_core();
        let buffer = GfxBuffer::new(&core, GfxBufferKind::Index, GfxCpuAccess::None, 64, 2, "ib").unwrap();

        assert_eq!(buffer.default_state(), ResourceState::INDEX_BUFFER);
        let resource = buffer.native_resource().unwrap();
        assert_eq!(buffer.default_state(), ResourceState::INDEX_BUFFER);
        assert_eq!(null.resource_state(resource), Some(ResourceState::INDEX_BUFFER));
        assert_eq!(null.call_count("CreatePlacedResource"), 1);
    }

    #[test]
    fn test_two_buffers_do_not_overlap() {
        let (_null, core) = null_core();
        let a = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, 100, 0, "a").unwrap();
        let b = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, 300, 0, "b").unwrap();
        a.native_resource().unwrap();
        b.native_resource().unwrap();

        let (oa, ob) = (a.region_offset().unwrap(), b.region_offset().unwrap());
        assert_eq!(oa, 0);
        assert!(ob >= oa + a.size());
        assert_eq!(ob % (64 * 1024), 0);
    }

    #[test]
    fn test_write_then_read() {
        let (_null, core) = null_core();
        let buffer = GfxBuffer::new(&core, GfxBufferKind::Constant, GfxCpuAccess::Write, 64, 0, "cb").unwrap();

        buffer.write_data(16, &[1.0_f32, 2.0, 3.0, 4.0]).unwrap();
        let data: Vec<f32> = buffer.read_data(16, 4).unwrap();
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_map_checks() {
        let (null, core) = null_core();
        let gpu_only = GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 64, 16, "vb").unwrap();
        assert!(matches!(gpu_only.map::<u8>(), Err(GfxError::InvalidArgument { name: "cpu_access", .. })));

        let upload = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, 64, 0, "upload").unwrap();
        assert!(matches!(upload.map_range::<u8>(0..65), Err(GfxError::InvalidArgument { name: "range", .. })));
        assert_eq!(null.call_count("Map"), 0);
        assert!(matches!(upload.unmap(), Err(GfxError::InvalidState { .. })));
    }

    #[test]
    fn test_invalid_construction() {
        let (_null, core) = null_core();
        assert!(GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::None, 0, 0, "empty").is_err());
        assert!(GfxBuffer::new(&core, GfxBufferKind::Index, GfxCpuAccess::None, 64, 0, "ib").is_err());
        assert!(GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 70, 16, "vb").is_err());
    }

    #[test]
    fn test_dispose() {
        let (null, core) = null_core();
        let buffer = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Read, 64, 0, "readback").unwrap();
        let resource = buffer.native_resource().unwrap();
        let block = core.memory().blocks()[0].clone();
        assert_eq!(block.live_allocations(), 1);

        buffer.dispose();
        assert_eq!(null.ref_count(resource.raw()), None);
        assert_eq!(block.live_allocations(), 0);
        assert!(buffer.is_disposed());
        assert!(matches!(buffer.native_resource(), Err(GfxError::Disposed { object: "GfxBuffer" })));
        assert!(matches!(buffer.map::<u8>(), Err(GfxError::Disposed { .. })));
    }
}
