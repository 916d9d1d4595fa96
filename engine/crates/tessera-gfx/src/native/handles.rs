use std::fmt::Debug;
use std::hash::Hash;

/// 原生对象的不透明句柄
///
/// 句柄本身只是一个整数，不拥有引用计数；拥有引用的是 [`super::NativeRef`]
pub trait NativeHandle: Copy + Eq + Hash + Debug + 'static {
    /// 原生接口的名字，用于日志和错误信息
    const TYPE_NAME: &'static str;

    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

macro_rules! native_handles {
    ($($(#[$meta:meta])* $name:ident => $type_name:literal;)*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl NativeHandle for $name {
            const TYPE_NAME: &'static str = $type_name;

            #[inline]
            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:#x})", $type_name, self.0)
            }
        }
    )*};
}

native_handles! {
    /// DXGI factory，用于枚举 adapter 和创建 swap chain
    FactoryHandle => "IDXGIFactory";
    /// 一张物理或虚拟的显卡
    AdapterHandle => "IDXGIAdapter";
    DeviceHandle => "ID3D12Device";
    QueueHandle => "ID3D12CommandQueue";
    SwapChainHandle => "IDXGISwapChain";
    /// 固定大小的显存块，资源以 offset 放置在其中
    HeapHandle => "ID3D12Heap";
    ResourceHandle => "ID3D12Resource";
    FenceHandle => "ID3D12Fence";
    /// 操作系统的事件对象，用于阻塞等待 fence
    EventHandle => "HANDLE(Event)";
    CommandAllocatorHandle => "ID3D12CommandAllocator";
    CommandListHandle => "ID3D12GraphicsCommandList";
    DescriptorHeapHandle => "ID3D12DescriptorHeap";
    RootSignatureHandle => "ID3D12RootSignature";
    PipelineStateHandle => "ID3D12PipelineState";
}
