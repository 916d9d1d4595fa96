use crate::basic::color::GfxColor;
use crate::native::handles::{DescriptorHeapHandle, PipelineStateHandle, ResourceHandle, RootSignatureHandle};
use crate::native::types::{
    CpuDescriptor, GfxRect, GfxViewport, GpuDescriptor, NativeFootprint, NativeIndexBufferView, NativeResourceBarrier,
    NativeVertexBufferView, PrimitiveTopology,
};

/// 录制到 command list 中的一条命令
///
/// 每个变体对应一个 `ID3D12GraphicsCommandList` 的方法
#[derive(Clone, Debug, PartialEq)]
pub enum NativeCommand {
    ResourceBarrier(Vec<NativeResourceBarrier>),
    SetRenderTargets {
        rtv: CpuDescriptor,
    },
    ClearRenderTargetView {
        rtv: CpuDescriptor,
        color: GfxColor,
    },
    SetViewport(GfxViewport),
    SetScissorRect(GfxRect),
    SetPrimitiveTopology(PrimitiveTopology),
    SetGraphicsRootSignature(RootSignatureHandle),
    SetPipelineState(PipelineStateHandle),
    SetDescriptorHeaps(Vec<DescriptorHeapHandle>),
    SetVertexBuffers {
        start_slot: u32,
        views: Vec<NativeVertexBufferView>,
    },
    SetIndexBuffer(NativeIndexBufferView),
    SetGraphicsRootConstantBufferView {
        root_index: u32,
        gpu_address: u64,
    },
    SetGraphicsRootDescriptorTable {
        root_index: u32,
        base: GpuDescriptor,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    CopyBufferRegion {
        dst: ResourceHandle,
        dst_offset: u64,
        src: ResourceHandle,
        src_offset: u64,
        size: u64,
    },
    /// 从 buffer（按 footprint 线性排布）拷贝到 texture 的第 0 个 subresource
    CopyTextureRegion {
        dst: ResourceHandle,
        src: ResourceHandle,
        footprint: NativeFootprint,
    },
}

impl NativeCommand {
    /// 原生方法名，用于日志和调试
    pub fn name(&self) -> &'static str {
        match self {
            NativeCommand::ResourceBarrier(_) => "ResourceBarrier",
            NativeCommand::SetRenderTargets { .. } => "OMSetRenderTargets",
            NativeCommand::ClearRenderTargetView { .. } => "ClearRenderTargetView",
            NativeCommand::SetViewport(_) => "RSSetViewports",
            NativeCommand::SetScissorRect(_) => "RSSetScissorRects",
            NativeCommand::SetPrimitiveTopology(_) => "IASetPrimitiveTopology",
            NativeCommand::SetGraphicsRootSignature(_) => "SetGraphicsRootSignature",
            NativeCommand::SetPipelineState(_) => "SetPipelineState",
            NativeCommand::SetDescriptorHeaps(_) => "SetDescriptorHeaps",
            NativeCommand::SetVertexBuffers { .. } => "IASetVertexBuffers",
            NativeCommand::SetIndexBuffer(_) => "IASetIndexBuffer",
            NativeCommand::SetGraphicsRootConstantBufferView { .. } => "SetGraphicsRootConstantBufferView",
            NativeCommand::SetGraphicsRootDescriptorTable { .. } => "SetGraphicsRootDescriptorTable",
            NativeCommand::DrawInstanced { .. } => "DrawInstanced",
            NativeCommand::DrawIndexedInstanced { .. } => "DrawIndexedInstanced",
            NativeCommand::CopyBufferRegion { .. } => "CopyBufferRegion",
            NativeCommand::CopyTextureRegion { .. } => "CopyTextureRegion",
        }
    }
}
