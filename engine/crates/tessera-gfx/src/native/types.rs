//! 跨越原生边界的纯数据描述
//!
//! 这些类型只描述 D3D12/DXGI 需要的参数，不包含任何逻辑

use serde::{Deserialize, Serialize};

use crate::native::handles::{ResourceHandle, RootSignatureHandle};

/// 二维尺寸（像素）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GfxExtent2D {
    pub width: u32,
    pub height: u32,
}
impl GfxExtent2D {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 像素/元素格式，对应 DXGI_FORMAT 的一个子集
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GfxFormat {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "r8g8b8a8_unorm")]
    R8G8B8A8Unorm,
    #[serde(rename = "b8g8r8a8_unorm")]
    B8G8R8A8Unorm,
    #[serde(rename = "r16_uint")]
    R16Uint,
    #[serde(rename = "r32_uint")]
    R32Uint,
    #[serde(rename = "r32_float")]
    R32Float,
    #[serde(rename = "r32g32_float")]
    R32G32Float,
    #[serde(rename = "r32g32b32_float")]
    R32G32B32Float,
    #[serde(rename = "r32g32b32a32_float")]
    R32G32B32A32Float,
}
impl GfxFormat {
    /// 单个元素（像素）的字节数
    pub const fn bytes_per_element(self) -> u32 {
        match self {
            GfxFormat::Unknown => 0,
            GfxFormat::R16Uint => 2,
            GfxFormat::R8G8B8A8Unorm | GfxFormat::B8G8R8A8Unorm | GfxFormat::R32Uint | GfxFormat::R32Float => 4,
            GfxFormat::R32G32Float => 8,
            GfxFormat::R32G32B32Float => 12,
            GfxFormat::R32G32B32A32Float => 16,
        }
    }
}

bitflags::bitflags! {
    /// 资源状态，数值与 D3D12_RESOURCE_STATES 一致
    ///
    /// `COMMON` 和 `PRESENT` 都是 0，见下方的关联常量
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
    }
}
impl ResourceState {
    pub const COMMON: Self = Self::empty();
    pub const PRESENT: Self = Self::empty();
    pub const GENERIC_READ: Self = Self::VERTEX_AND_CONSTANT_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::NON_PIXEL_SHADER_RESOURCE)
        .union(Self::PIXEL_SHADER_RESOURCE)
        .union(Self::INDIRECT_ARGUMENT)
        .union(Self::COPY_SOURCE);
    pub const ALL_SHADER_RESOURCE: Self = Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);
}

/// heap 的内存类型，由 CPU 访问方式决定
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeHeapKind {
    /// 只有 GPU 可以访问
    Default,
    /// CPU 写，GPU 读
    Upload,
    /// GPU 写，CPU 读
    Readback,
}

/// heap 中允许放置的资源类别（resource heap tier 1 的限制）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeHeapCategory {
    Buffers,
    Textures,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeHeapDesc {
    pub size: u64,
    pub alignment: u64,
    pub kind: NativeHeapKind,
    pub category: NativeHeapCategory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeResourceDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeResourceDesc {
    pub dimension: NativeResourceDimension,
    /// buffer 的字节数，或者 texture 的宽度
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: GfxFormat,
}
impl NativeResourceDesc {
    pub fn buffer(size: u64) -> Self {
        Self {
            dimension: NativeResourceDimension::Buffer,
            width: size,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: GfxFormat::Unknown,
        }
    }

    pub fn texture(dimension: NativeResourceDimension, width: u32, height: u32, depth: u16, format: GfxFormat) -> Self {
        Self {
            dimension,
            width: width as u64,
            height,
            depth_or_array_size: depth,
            mip_levels: 1,
            format,
        }
    }

    #[inline]
    pub fn is_buffer(&self) -> bool {
        self.dimension == NativeResourceDimension::Buffer
    }
}

/// `GetResourceAllocationInfo` 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeAllocationInfo {
    pub size: u64,
    pub alignment: u64,
}

/// texture 在 buffer 中的线性布局，用于 buffer → texture 的拷贝
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeFootprint {
    pub offset: u64,
    pub format: GfxFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u32,
}
impl NativeFootprint {
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.row_pitch as u64 * self.height as u64 * self.depth as u64
    }
}

/// `DXGI_ADAPTER_DESC1` 中与 provider 相关的部分
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeAdapterDesc {
    /// 定长、以 NUL 结尾的 UTF-16 名字
    pub description: [u16; 128],
    pub vendor_id: u32,
    pub device_id: u32,
    pub sub_sys_id: u32,
    pub revision: u32,
    pub dedicated_video_memory: u64,
    pub shared_system_memory: u64,
    pub is_software: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeSwapChainDesc {
    pub extent: GfxExtent2D,
    pub format: GfxFormat,
    pub buffer_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeDescriptorHeapKind {
    Rtv,
    CbvSrvUav,
}

/// CPU 侧的 descriptor 地址
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CpuDescriptor(pub u64);
impl CpuDescriptor {
    #[inline]
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// GPU 侧（shader visible heap）的 descriptor 地址
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuDescriptor(pub u64);
impl GpuDescriptor {
    #[inline]
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeShaderResourceViewDesc {
    pub format: GfxFormat,
    pub dimension: NativeResourceDimension,
    pub mip_levels: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    #[default]
    All,
    Vertex,
    Pixel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeRootParameter {
    /// 通过 GPU 地址直接绑定的 constant buffer（`b{register}`）
    ConstantBufferView { register: u32, visibility: ShaderVisibility },
    /// 只有一个 SRV range 的 descriptor table（`t{base_register}`）
    SrvDescriptorTable { base_register: u32, count: u32, visibility: ShaderVisibility },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeStaticSampler {
    pub register: u32,
    pub visibility: ShaderVisibility,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NativeRootSignatureDesc {
    pub parameters: Vec<NativeRootParameter>,
    pub static_samplers: Vec<NativeStaticSampler>,
    pub allow_input_layout: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeInputElement {
    pub semantic_name: &'static str,
    pub semantic_index: u32,
    pub format: GfxFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
}

#[derive(Clone, Copy, Debug)]
pub struct NativeGraphicsPipelineDesc<'a> {
    pub root_signature: RootSignatureHandle,
    pub vertex_shader: Option<&'a [u8]>,
    pub pixel_shader: Option<&'a [u8]>,
    pub input_layout: &'a [NativeInputElement],
    pub render_target_format: GfxFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GfxViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GfxRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}
impl GfxViewport {
    /// 覆盖整个 extent，深度范围 [0, 1]
    pub fn covering(extent: GfxExtent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl GfxRect {
    /// 覆盖整个 extent，超过 `i32::MAX` 的边长被截断
    pub fn covering(extent: GfxExtent2D) -> Self {
        Self {
            left: 0,
            top: 0,
            right: i32::try_from(extent.width).unwrap_or(i32::MAX),
            bottom: i32::try_from(extent.height).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeVertexBufferView {
    pub gpu_address: u64,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeIndexBufferView {
    pub gpu_address: u64,
    pub size_in_bytes: u32,
    pub format: GfxFormat,
}

/// 对所有 subresource 生效
pub const ALL_SUBRESOURCES: u32 = 0xFFFF_FFFF;

/// transition barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeResourceBarrier {
    pub resource: ResourceHandle,
    pub subresource: u32,
    pub before: ResourceState,
    pub after: ResourceState,
}
