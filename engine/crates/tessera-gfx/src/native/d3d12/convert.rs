//! 原生边界类型到 D3D12/DXGI 结构体的转换

use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::{D3D_PRIMITIVE_TOPOLOGY, D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::native::{
    GfxFormat, GfxRect, GfxViewport, NativeDescriptorHeapKind, NativeFootprint, NativeHeapCategory, NativeHeapKind,
    NativeResourceDesc, NativeResourceDimension, PrimitiveTopology, ResourceState, ShaderVisibility,
};

pub(super) fn format(format: GfxFormat) -> DXGI_FORMAT {
    match format {
        GfxFormat::Unknown => DXGI_FORMAT_UNKNOWN,
        GfxFormat::R8G8B8A8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        GfxFormat::B8G8R8A8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        GfxFormat::R16Uint => DXGI_FORMAT_R16_UINT,
        GfxFormat::R32Uint => DXGI_FORMAT_R32_UINT,
        GfxFormat::R32Float => DXGI_FORMAT_R32_FLOAT,
        GfxFormat::R32G32Float => DXGI_FORMAT_R32G32_FLOAT,
        GfxFormat::R32G32B32Float => DXGI_FORMAT_R32G32B32_FLOAT,
        GfxFormat::R32G32B32A32Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
    }
}

fn gfx_format(format: DXGI_FORMAT) -> GfxFormat {
    match format {
        DXGI_FORMAT_R8G8B8A8_UNORM => GfxFormat::R8G8B8A8Unorm,
        DXGI_FORMAT_B8G8R8A8_UNORM => GfxFormat::B8G8R8A8Unorm,
        DXGI_FORMAT_R16_UINT => GfxFormat::R16Uint,
        DXGI_FORMAT_R32_UINT => GfxFormat::R32Uint,
        DXGI_FORMAT_R32_FLOAT => GfxFormat::R32Float,
        DXGI_FORMAT_R32G32_FLOAT => GfxFormat::R32G32Float,
        DXGI_FORMAT_R32G32B32_FLOAT => GfxFormat::R32G32B32Float,
        DXGI_FORMAT_R32G32B32A32_FLOAT => GfxFormat::R32G32B32A32Float,
        _ => GfxFormat::Unknown,
    }
}

#[inline]
pub(super) fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    D3D12_RESOURCE_STATES(state.bits() as i32)
}

pub(super) fn resource_desc(desc: &NativeResourceDesc) -> D3D12_RESOURCE_DESC {
    let (dimension, layout) = match desc.dimension {
        NativeResourceDimension::Buffer => (D3D12_RESOURCE_DIMENSION_BUFFER, D3D12_TEXTURE_LAYOUT_ROW_MAJOR),
        NativeResourceDimension::Texture1D => (D3D12_RESOURCE_DIMENSION_TEXTURE1D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
        NativeResourceDimension::Texture2D => (D3D12_RESOURCE_DIMENSION_TEXTURE2D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
        NativeResourceDimension::Texture3D => (D3D12_RESOURCE_DIMENSION_TEXTURE3D, D3D12_TEXTURE_LAYOUT_UNKNOWN),
    };
    D3D12_RESOURCE_DESC {
        Dimension: dimension,
        Alignment: 0,
        Width: desc.width,
        Height: desc.height,
        DepthOrArraySize: desc.depth_or_array_size,
        MipLevels: desc.mip_levels,
        Format: format(desc.format),
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: layout,
        Flags: D3D12_RESOURCE_FLAG_NONE,
    }
}

pub(super) fn heap_type(kind: NativeHeapKind) -> D3D12_HEAP_TYPE {
    match kind {
        NativeHeapKind::Default => D3D12_HEAP_TYPE_DEFAULT,
        NativeHeapKind::Upload => D3D12_HEAP_TYPE_UPLOAD,
        NativeHeapKind::Readback => D3D12_HEAP_TYPE_READBACK,
    }
}

pub(super) fn heap_flags(category: NativeHeapCategory) -> D3D12_HEAP_FLAGS {
    match category {
        NativeHeapCategory::Buffers => D3D12_HEAP_FLAG_ALLOW_ONLY_BUFFERS,
        NativeHeapCategory::Textures => D3D12_HEAP_FLAG_ALLOW_ONLY_NON_RT_DS_TEXTURES,
    }
}

pub(super) fn descriptor_heap_type(kind: NativeDescriptorHeapKind) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match kind {
        NativeDescriptorHeapKind::Rtv => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
        NativeDescriptorHeapKind::CbvSrvUav => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
    }
}

pub(super) fn shader_visibility(visibility: ShaderVisibility) -> D3D12_SHADER_VISIBILITY {
    match visibility {
        ShaderVisibility::All => D3D12_SHADER_VISIBILITY_ALL,
        ShaderVisibility::Vertex => D3D12_SHADER_VISIBILITY_VERTEX,
        ShaderVisibility::Pixel => D3D12_SHADER_VISIBILITY_PIXEL,
    }
}

pub(super) fn topology(topology: PrimitiveTopology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        PrimitiveTopology::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
    }
}

pub(super) fn viewport(viewport: &GfxViewport) -> D3D12_VIEWPORT {
    D3D12_VIEWPORT {
        TopLeftX: viewport.x,
        TopLeftY: viewport.y,
        Width: viewport.width,
        Height: viewport.height,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

pub(super) fn rect(rect: &GfxRect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

pub(super) fn subresource_footprint(footprint: &NativeFootprint) -> D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
    D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
        Offset: footprint.offset,
        Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
            Format: format(footprint.format),
            Width: footprint.width,
            Height: footprint.height,
            Depth: footprint.depth,
            RowPitch: footprint.row_pitch,
        },
    }
}

pub(super) fn native_footprint(footprint: &D3D12_PLACED_SUBRESOURCE_FOOTPRINT) -> NativeFootprint {
    NativeFootprint {
        offset: footprint.Offset,
        format: gfx_format(footprint.Footprint.Format),
        width: footprint.Footprint.Width,
        height: footprint.Footprint.Height,
        depth: footprint.Footprint.Depth,
        row_pitch: footprint.Footprint.RowPitch,
    }
}
