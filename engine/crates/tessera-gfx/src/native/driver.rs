use std::ops::Range;

use raw_window_handle::RawWindowHandle;

use crate::native::command::NativeCommand;
use crate::native::handles::{
    AdapterHandle, CommandAllocatorHandle, CommandListHandle, DescriptorHeapHandle, DeviceHandle, EventHandle,
    FactoryHandle, FenceHandle, HeapHandle, PipelineStateHandle, QueueHandle, ResourceHandle, RootSignatureHandle,
    SwapChainHandle,
};
use crate::native::status::{NativeResult, NativeWaitStatus};
use crate::native::types::{
    CpuDescriptor, GpuDescriptor, NativeAdapterDesc, NativeAllocationInfo, NativeDescriptorHeapKind, NativeFootprint,
    NativeGraphicsPipelineDesc, NativeHeapDesc, NativeResourceDesc, NativeRootSignatureDesc,
    NativeShaderResourceViewDesc, NativeSwapChainDesc,
};
use crate::native::ResourceState;

/// 原生图形驱动（D3D12 + DXGI + OS 同步对象）的调用边界
///
/// 所有 `create_*` / `enum_*` / `swap_chain_buffer` 返回的句柄都带有一个引用，
/// 调用方负责通过 [`NativeDriver::release`] 释放（通常交给 [`super::NativeRef`]）。
///
/// 失败时返回 HRESULT 形状的 [`super::NativeStatus`]，上层不做任何重试。
///
/// 单线程使用：一个 driver 只在一个提交线程上被调用
pub trait NativeDriver {
    /// 后端的名字，用于日志
    fn backend_name(&self) -> &'static str;

    // region 引用计数
    /// AddRef，返回新的引用计数
    fn add_ref(&self, raw: u64) -> u32;
    /// Release，返回剩余的引用计数，归零时对象被销毁
    fn release(&self, raw: u64) -> u32;
    // endregion

    // region factory & adapter
    fn create_factory(&self, enable_debug_layer: bool) -> NativeResult<FactoryHandle>;
    /// 超出范围时返回 `DXGI_ERROR_NOT_FOUND`
    fn enum_adapter(&self, factory: FactoryHandle, index: u32) -> NativeResult<AdapterHandle>;
    fn adapter_desc(&self, adapter: AdapterHandle) -> NativeResult<NativeAdapterDesc>;
    // endregion

    // region device & queue
    fn create_device(&self, adapter: AdapterHandle) -> NativeResult<DeviceHandle>;
    fn create_command_queue(&self, device: DeviceHandle) -> NativeResult<QueueHandle>;
    fn resource_allocation_info(
        &self,
        device: DeviceHandle,
        desc: &NativeResourceDesc,
    ) -> NativeResult<NativeAllocationInfo>;
    fn copyable_footprint(&self, device: DeviceHandle, desc: &NativeResourceDesc) -> NativeResult<NativeFootprint>;
    // endregion

    // region swap chain
    /// `window` 为 None 表示没有窗口的 surface，只有不需要真正呈现的后端才接受
    fn create_swap_chain(
        &self,
        factory: FactoryHandle,
        queue: QueueHandle,
        window: Option<RawWindowHandle>,
        desc: &NativeSwapChainDesc,
    ) -> NativeResult<SwapChainHandle>;
    fn swap_chain_buffer(&self, swap_chain: SwapChainHandle, index: u32) -> NativeResult<ResourceHandle>;
    fn swap_chain_current_back_buffer_index(&self, swap_chain: SwapChainHandle) -> u32;
    fn swap_chain_present(&self, swap_chain: SwapChainHandle, sync_interval: u32) -> NativeResult<()>;
    /// 调用前必须释放所有通过 `swap_chain_buffer` 得到的引用，否则返回 `DXGI_ERROR_INVALID_CALL`
    fn swap_chain_resize_buffers(&self, swap_chain: SwapChainHandle, desc: &NativeSwapChainDesc) -> NativeResult<()>;
    // endregion

    // region memory
    fn create_heap(&self, device: DeviceHandle, desc: &NativeHeapDesc) -> NativeResult<HeapHandle>;
    fn create_placed_resource(
        &self,
        device: DeviceHandle,
        heap: HeapHandle,
        offset: u64,
        desc: &NativeResourceDesc,
        initial_state: ResourceState,
    ) -> NativeResult<ResourceHandle>;
    /// `read_range` 为 None 表示 CPU 可能读取整个资源
    fn map_resource(&self, resource: ResourceHandle, read_range: Option<Range<usize>>) -> NativeResult<*mut u8>;
    /// `written_range` 为 None 表示 CPU 可能写入了整个资源
    fn unmap_resource(&self, resource: ResourceHandle, written_range: Option<Range<usize>>);
    fn resource_gpu_address(&self, resource: ResourceHandle) -> u64;
    // endregion

    // region descriptors
    fn create_descriptor_heap(
        &self,
        device: DeviceHandle,
        kind: NativeDescriptorHeapKind,
        count: u32,
        shader_visible: bool,
    ) -> NativeResult<DescriptorHeapHandle>;
    fn descriptor_increment_size(&self, device: DeviceHandle, kind: NativeDescriptorHeapKind) -> u32;
    fn descriptor_heap_cpu_start(&self, heap: DescriptorHeapHandle) -> CpuDescriptor;
    fn descriptor_heap_gpu_start(&self, heap: DescriptorHeapHandle) -> GpuDescriptor;
    fn create_render_target_view(&self, device: DeviceHandle, resource: ResourceHandle, dest: CpuDescriptor);
    fn create_shader_resource_view(
        &self,
        device: DeviceHandle,
        resource: ResourceHandle,
        desc: &NativeShaderResourceViewDesc,
        dest: CpuDescriptor,
    );
    // endregion

    // region pipelines
    fn create_root_signature(
        &self,
        device: DeviceHandle,
        desc: &NativeRootSignatureDesc,
    ) -> NativeResult<RootSignatureHandle>;
    fn create_graphics_pipeline_state(
        &self,
        device: DeviceHandle,
        desc: &NativeGraphicsPipelineDesc<'_>,
    ) -> NativeResult<PipelineStateHandle>;
    // endregion

    // region synchronization
    fn create_fence(&self, device: DeviceHandle, initial_value: u64) -> NativeResult<FenceHandle>;
    fn fence_completed_value(&self, fence: FenceHandle) -> u64;
    fn fence_set_event_on_completion(&self, fence: FenceHandle, value: u64, event: EventHandle) -> NativeResult<()>;
    fn queue_signal(&self, queue: QueueHandle, fence: FenceHandle, value: u64) -> NativeResult<()>;
    /// 自动重置的事件
    fn create_event(&self) -> NativeResult<EventHandle>;
    /// 阻塞当前线程，`timeout_ms == INFINITE_WAIT_MS` 表示无限等待；超时不是错误
    fn wait_for_event(&self, event: EventHandle, timeout_ms: u32) -> NativeResult<NativeWaitStatus>;
    // endregion

    // region commands
    fn create_command_allocator(&self, device: DeviceHandle) -> NativeResult<CommandAllocatorHandle>;
    fn reset_command_allocator(&self, allocator: CommandAllocatorHandle) -> NativeResult<()>;
    /// 返回的 command list 处于 closed 状态
    fn create_command_list(
        &self,
        device: DeviceHandle,
        allocator: CommandAllocatorHandle,
    ) -> NativeResult<CommandListHandle>;
    fn reset_command_list(
        &self,
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
        initial_pipeline: Option<PipelineStateHandle>,
    ) -> NativeResult<()>;
    fn close_command_list(&self, list: CommandListHandle) -> NativeResult<()>;
    fn record_command(&self, list: CommandListHandle, command: NativeCommand);
    fn execute_command_lists(&self, queue: QueueHandle, lists: &[CommandListHandle]);
    // endregion
}
