use crate::native::{
    CpuDescriptor, GpuDescriptor, NativeAdapterDesc, NativeCommand, NativeDescriptorHeapKind, NativeHeapDesc,
    NativeResourceDesc, NativeRootSignatureDesc, NativeSwapChainDesc, ResourceState,
};

/// null driver 中的一个原生对象
pub(super) enum NullObject {
    Factory {
        _debug_layer: bool,
    },
    Adapter {
        desc: NativeAdapterDesc,
    },
    Device,
    Queue,
    SwapChain(NullSwapChain),
    Heap(NullHeap),
    Resource(NullResource),
    Fence(NullFence),
    Event {
        signaled: bool,
    },
    CommandAllocator,
    CommandList(NullCommandList),
    DescriptorHeap(NullDescriptorHeap),
    RootSignature {
        _desc: NativeRootSignatureDesc,
    },
    PipelineState,
}

impl NullObject {
    pub(super) fn kind_name(&self) -> &'static str {
        match self {
            NullObject::Factory { .. } => "Factory",
            NullObject::Adapter { .. } => "Adapter",
            NullObject::Device => "Device",
            NullObject::Queue => "CommandQueue",
            NullObject::SwapChain(_) => "SwapChain",
            NullObject::Heap(_) => "Heap",
            NullObject::Resource(_) => "Resource",
            NullObject::Fence(_) => "Fence",
            NullObject::Event { .. } => "Event",
            NullObject::CommandAllocator => "CommandAllocator",
            NullObject::CommandList(_) => "CommandList",
            NullObject::DescriptorHeap(_) => "DescriptorHeap",
            NullObject::RootSignature { .. } => "RootSignature",
            NullObject::PipelineState => "PipelineState",
        }
    }

    /// 对象销毁时需要一并释放的子对象引用
    pub(super) fn owned_refs(&self) -> Vec<u64> {
        match self {
            NullObject::SwapChain(swap_chain) => swap_chain.buffers.clone(),
            NullObject::Resource(resource) => resource.heap.into_iter().collect(),
            _ => vec![],
        }
    }
}

pub(super) struct NullSwapChain {
    pub desc: NativeSwapChainDesc,
    /// swap chain 自身对每个 buffer 持有一个引用
    pub buffers: Vec<u64>,
    pub current_index: u32,
    pub present_count: u64,
}

pub(super) struct NullHeap {
    pub desc: NativeHeapDesc,
    /// 模拟的显存，地址在 heap 生命周期内保持不变
    pub memory: Vec<u8>,
    pub gpu_base: u64,
}

pub(super) struct NullResource {
    pub desc: NativeResourceDesc,
    /// placed resource 对所在的 heap 持有一个引用；swap chain buffer 没有 heap
    pub heap: Option<u64>,
    pub offset: u64,
    pub size: u64,
    pub state: ResourceState,
    pub map_count: u32,
    pub gpu_address: u64,
}

pub(super) struct NullFence {
    pub completed: u64,
    /// (等待的值, event)
    pub waiters: Vec<(u64, u64)>,
}

pub(super) struct NullCommandList {
    pub open: bool,
    pub commands: Vec<NativeCommand>,
    pub reset_count: u64,
    pub close_count: u64,
    /// 录制过引用无效对象的命令，下一次 Close 失败
    pub poisoned: bool,
}

pub(super) struct NullDescriptorHeap {
    pub _kind: NativeDescriptorHeapKind,
    pub _count: u32,
    pub cpu_start: CpuDescriptor,
    pub gpu_start: GpuDescriptor,
}
