use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Graphics::Direct3D12::{
    ID3D12CommandAllocator, ID3D12CommandQueue, ID3D12DescriptorHeap, ID3D12Device, ID3D12Fence,
    ID3D12GraphicsCommandList, ID3D12Heap, ID3D12PipelineState, ID3D12Resource, ID3D12RootSignature,
};
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter1, IDXGIFactory4, IDXGISwapChain3};

/// 自动重置的事件，drop 时 CloseHandle
pub(super) struct OwnedEvent(pub HANDLE);

impl Drop for OwnedEvent {
    fn drop(&mut self) {
        if self.0.is_invalid() {
            return;
        }
        if let Err(err) = unsafe { CloseHandle(self.0) } {
            log::error!("CloseHandle failed: {}", err);
        }
    }
}

/// 句柄表中的一个 COM 对象
///
/// 句柄表的引用计数归零时整个对象被 drop，COM 对象随之 Release
pub(super) enum D3d12Object {
    Factory(IDXGIFactory4),
    Adapter(IDXGIAdapter1),
    Device(ID3D12Device),
    Queue(ID3D12CommandQueue),
    SwapChain(IDXGISwapChain3),
    Heap(ID3D12Heap),
    Resource(ID3D12Resource),
    Fence(ID3D12Fence),
    Event(OwnedEvent),
    CommandAllocator(ID3D12CommandAllocator),
    CommandList(ID3D12GraphicsCommandList),
    DescriptorHeap(ID3D12DescriptorHeap),
    RootSignature(ID3D12RootSignature),
    PipelineState(ID3D12PipelineState),
}

impl D3d12Object {
    pub(super) fn kind_name(&self) -> &'static str {
        match self {
            D3d12Object::Factory(_) => "Factory",
            D3d12Object::Adapter(_) => "Adapter",
            D3d12Object::Device(_) => "Device",
            D3d12Object::Queue(_) => "CommandQueue",
            D3d12Object::SwapChain(_) => "SwapChain",
            D3d12Object::Heap(_) => "Heap",
            D3d12Object::Resource(_) => "Resource",
            D3d12Object::Fence(_) => "Fence",
            D3d12Object::Event(_) => "Event",
            D3d12Object::CommandAllocator(_) => "CommandAllocator",
            D3d12Object::CommandList(_) => "CommandList",
            D3d12Object::DescriptorHeap(_) => "DescriptorHeap",
            D3d12Object::RootSignature(_) => "RootSignature",
            D3d12Object::PipelineState(_) => "PipelineState",
        }
    }
}

/// 从句柄表中按类型取出 COM 对象（clone 即 AddRef）
pub(super) trait FromObject: Sized {
    fn from_object(object: &D3d12Object) -> Option<Self>;
}

macro_rules! from_object {
    ($($variant:ident => $ty:ty;)*) => {$(
        impl FromObject for $ty {
            #[inline]
            fn from_object(object: &D3d12Object) -> Option<Self> {
                match object {
                    D3d12Object::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    )*};
}

from_object! {
    Factory => IDXGIFactory4;
    Adapter => IDXGIAdapter1;
    Device => ID3D12Device;
    Queue => ID3D12CommandQueue;
    SwapChain => IDXGISwapChain3;
    Heap => ID3D12Heap;
    Resource => ID3D12Resource;
    Fence => ID3D12Fence;
    CommandAllocator => ID3D12CommandAllocator;
    CommandList => ID3D12GraphicsCommandList;
    DescriptorHeap => ID3D12DescriptorHeap;
    RootSignature => ID3D12RootSignature;
    PipelineState => ID3D12PipelineState;
}

impl FromObject for HANDLE {
    #[inline]
    fn from_object(object: &D3d12Object) -> Option<Self> {
        match object {
            D3d12Object::Event(event) => Some(event.0),
            _ => None,
        }
    }
}
