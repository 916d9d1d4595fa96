use crate::memory::GfxHeapKind;
use crate::native::{NativeResourceDimension, ResourceState};

/// CPU 对资源的访问方式，决定资源放在哪种 heap 中
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GfxCpuAccess {
    /// 只有 GPU 访问
    #[default]
    None,
    /// CPU 读取 GPU 写入的数据
    Read,
    /// CPU 写入，GPU 读取
    Write,
}

impl GfxCpuAccess {
    #[inline]
    pub fn heap_kind(self) -> GfxHeapKind {
        match self {
            GfxCpuAccess::None => GfxHeapKind::Default,
            GfxCpuAccess::Read => GfxHeapKind::Readback,
            GfxCpuAccess::Write => GfxHeapKind::Upload,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GfxBufferKind {
    #[default]
    Default,
    Vertex,
    Index,
    Constant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxTextureKind {
    OneDimensional,
    TwoDimensional,
    ThreeDimensional,
}

impl GfxTextureKind {
    #[inline]
    pub fn dimension(self) -> NativeResourceDimension {
        match self {
            GfxTextureKind::OneDimensional => NativeResourceDimension::Texture1D,
            GfxTextureKind::TwoDimensional => NativeResourceDimension::Texture2D,
            GfxTextureKind::ThreeDimensional => NativeResourceDimension::Texture3D,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxResourceKind {
    Buffer(GfxBufferKind),
    Texture(GfxTextureKind),
}

/// 资源创建时（以及每次 GPU 操作结束后）所处的状态
///
/// CPU 可访问的资源由 heap 类型决定状态，否则由资源用途决定
pub fn default_resource_state(cpu_access: GfxCpuAccess, kind: GfxResourceKind) -> ResourceState {
    match (cpu_access, kind) {
        (GfxCpuAccess::Read, _) => ResourceState::COPY_DEST,
        (GfxCpuAccess::Write, _) => ResourceState::GENERIC_READ,
        (GfxCpuAccess::None, GfxResourceKind::Buffer(GfxBufferKind::Vertex | GfxBufferKind::Constant)) => {
            ResourceState::VERTEX_AND_CONSTANT_BUFFER
        }
        (GfxCpuAccess::None, GfxResourceKind::Buffer(GfxBufferKind::Index)) => ResourceState::INDEX_BUFFER,
        (GfxCpuAccess::None, GfxResourceKind::Buffer(GfxBufferKind::Default)) => ResourceState::COMMON,
        (GfxCpuAccess::None, GfxResourceKind::Texture(_)) => ResourceState::ALL_SHADER_RESOURCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_access_decides_state() {
        for kind in [
            GfxResourceKind::Buffer(GfxBufferKind::Index),
            GfxResourceKind::Texture(GfxTextureKind::TwoDimensional),
        ] {
            assert_eq!(default_resource_state(GfxCpuAccess::Read, kind), ResourceState::COPY_DEST);
            assert_eq!(default_resource_state(GfxCpuAccess::Write, kind), ResourceState::GENERIC_READ);
        }
    }

    #[test]
    fn test_gpu_only_state_by_kind() {
        let state = |kind| default_resource_state(GfxCpuAccess::None, kind);
        assert_eq!(state(GfxResourceKind::Buffer(GfxBufferKind::Vertex)), ResourceState::VERTEX_AND_CONSTANT_BUFFER);
        assert_eq!(state(GfxResourceKind::Buffer(GfxBufferKind::Constant)), ResourceState::VERTEX_AND_CONSTANT_BUFFER);
        assert_eq!(state(GfxResourceKind::Buffer(GfxBufferKind::Index)), ResourceState::INDEX_BUFFER);
        assert_eq!(state(GfxResourceKind::Buffer(GfxBufferKind::Default)), ResourceState::COMMON);
        assert_eq!(
            state(GfxResourceKind::Texture(GfxTextureKind::ThreeDimensional)),
            ResourceState::PIXEL_SHADER_RESOURCE | ResourceState::NON_PIXEL_SHADER_RESOURCE
        );
    }

    #[test]
    fn test_heap_kind() {
        assert_eq!(GfxCpuAccess::None.heap_kind(), GfxHeapKind::Default);
        assert_eq!(GfxCpuAccess::Read.heap_kind(), GfxHeapKind::Readback);
        assert_eq!(GfxCpuAccess::Write.heap_kind(), GfxHeapKind::Upload);
    }
}
