//! 纯软件实现的 [`NativeDriver`]
//!
//! 不需要显卡，所有对象保存在一张带引用计数的句柄表里：
//!
//! - heap 用一段真实的内存模拟，map 出来的指针可以直接读写
//! - command list 在 execute 时才真正执行拷贝命令，并像 debug layer 一样检查 barrier 的前置状态
//! - 默认情况下 queue signal 立即完成；关闭 auto complete 之后需要手动 [`NullDriver::complete_pending_work`]
//! - 提供一组检查接口（调用次数、存活对象、录制的命令等），供测试使用

mod objects;

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;

use itertools::Itertools;
use raw_window_handle::RawWindowHandle;

use crate::native::handle_table::HandleTable;
use crate::native::{
    AdapterHandle, CommandAllocatorHandle, CommandListHandle, CpuDescriptor, DescriptorHeapHandle, DeviceHandle,
    EventHandle, FactoryHandle, FenceHandle, GfxFormat, GpuDescriptor, HeapHandle, NativeAdapterDesc,
    NativeAllocationInfo, NativeCommand, NativeDescriptorHeapKind, NativeDriver, NativeFootprint,
    NativeGraphicsPipelineDesc, NativeHandle, NativeHeapCategory, NativeHeapDesc, NativeHeapKind, NativeResourceDesc,
    NativeResourceDimension, NativeResult, NativeRootSignatureDesc, NativeShaderResourceViewDesc, NativeStatus,
    NativeSwapChainDesc, NativeWaitStatus, PipelineStateHandle, QueueHandle, ResourceHandle, ResourceState,
    RootSignatureHandle, SwapChainHandle, INFINITE_WAIT_MS,
};
use objects::{
    NullCommandList, NullDescriptorHeap, NullFence, NullHeap, NullObject, NullResource, NullSwapChain,
};

/// placed resource 的对齐要求（D3D12_DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT）
pub const NULL_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;
/// texture 每一行在 buffer 中的对齐（D3D12_TEXTURE_DATA_PITCH_ALIGNMENT）
const TEXTURE_PITCH_ALIGNMENT: u32 = 256;
const RTV_DESCRIPTOR_SIZE: u32 = 32;
const CBV_SRV_UAV_DESCRIPTOR_SIZE: u32 = 64;

const GPU_ADDRESS_BASE: u64 = 0x1_0000_0000;
const DESCRIPTOR_ADDRESS_BASE: u64 = 0x10_0000;

#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// null driver 中一张 adapter 的配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NullAdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: u64,
    pub is_software: bool,
}

impl NullAdapterInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor_id: 0x1414,
            device_id: 0x008C,
            dedicated_video_memory: 0,
            is_software: true,
        }
    }

    fn to_desc(&self) -> NativeAdapterDesc {
        let mut description = [0_u16; 128];
        // 最后一个元素保留给 NUL
        for (dst, src) in description.iter_mut().take(127).zip(self.name.encode_utf16()) {
            *dst = src;
        }
        NativeAdapterDesc {
            description,
            vendor_id: self.vendor_id,
            device_id: self.device_id,
            sub_sys_id: 0,
            revision: 0,
            dedicated_video_memory: self.dedicated_video_memory,
            shared_system_memory: 0,
            is_software: self.is_software,
        }
    }
}

/// 一个 command list 的统计数据
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullCommandListStats {
    pub reset_count: u64,
    pub close_count: u64,
    pub is_open: bool,
    pub command_count: usize,
}

struct NullState {
    objects: HandleTable<NullObject>,
    adapters: Vec<NullAdapterInfo>,

    auto_complete: bool,
    /// 尚未完成的 queue signal：(fence, value)
    pending_signals: Vec<(u64, u64)>,

    call_counts: HashMap<&'static str, usize>,
    injected_failures: HashMap<&'static str, NativeStatus>,
    validation_errors: Vec<String>,
    event_wait_timeouts: Vec<u32>,
    draw_count: u64,

    next_gpu_address: u64,
    next_descriptor_address: u64,
}

pub struct NullDriver {
    state: RefCell<NullState>,
}

// new & init
impl NullDriver {
    /// 只有一张软件 adapter 的 driver
    pub fn new() -> Self {
        Self::with_adapters(vec![NullAdapterInfo::new("Tessera Null Adapter")])
    }

    pub fn with_adapters(adapters: Vec<NullAdapterInfo>) -> Self {
        Self {
            state: RefCell::new(NullState {
                objects: HandleTable::new(),
                adapters,
                auto_complete: true,
                pending_signals: vec![],
                call_counts: HashMap::new(),
                injected_failures: HashMap::new(),
                validation_errors: vec![],
                event_wait_timeouts: vec![],
                draw_count: 0,
                next_gpu_address: GPU_ADDRESS_BASE,
                next_descriptor_address: DESCRIPTOR_ADDRESS_BASE,
            }),
        }
    }
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new()
    }
}

// tools
impl NullDriver {
    /// 为 false 时 queue signal 不会立即完成，需要调用 [`Self::complete_pending_work`]
    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.state.borrow_mut().auto_complete = auto_complete;
    }

    /// 完成所有已经提交的 queue signal
    pub fn complete_pending_work(&self) {
        let mut state = self.state.borrow_mut();
        let pending = std::mem::take(&mut state.pending_signals);
        for (fence, value) in pending {
            state.signal_fence(fence, value);
        }
    }

    /// 下一次名为 `operation` 的原生调用返回 `status`
    pub fn fail_next_call(&self, operation: &'static str, status: NativeStatus) {
        self.state.borrow_mut().injected_failures.insert(operation, status);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.borrow().call_counts.get(operation).copied().unwrap_or(0)
    }

    pub fn live_object_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    /// 按类型统计的存活对象，按名字排序
    pub fn live_objects(&self) -> Vec<(&'static str, usize)> {
        let state = self.state.borrow();
        state.objects.iter().map(|(_, object)| object.kind_name()).counts().into_iter().sorted().collect()
    }

    pub fn ref_count(&self, raw: u64) -> Option<u32> {
        self.state.borrow().objects.ref_count(raw)
    }

    pub fn resource_state(&self, resource: ResourceHandle) -> Option<ResourceState> {
        self.state.borrow().resource(resource.raw()).ok().map(|r| r.state)
    }

    pub fn command_list_stats(&self, list: CommandListHandle) -> Option<NullCommandListStats> {
        let state = self.state.borrow();
        match state.objects.get(list.raw()) {
            Some(NullObject::CommandList(list)) => Some(NullCommandListStats {
                reset_count: list.reset_count,
                close_count: list.close_count,
                is_open: list.open,
                command_count: list.commands.len(),
            }),
            _ => None,
        }
    }

    /// 最近一次 reset 之后录制的命令
    pub fn recorded_commands(&self, list: CommandListHandle) -> Vec<NativeCommand> {
        match self.state.borrow().objects.get(list.raw()) {
            Some(NullObject::CommandList(list)) => list.commands.clone(),
            _ => vec![],
        }
    }

    /// 类似 debug layer 的检查消息：barrier 前置状态不匹配、执行未关闭的 command list 等
    pub fn validation_errors(&self) -> Vec<String> {
        self.state.borrow().validation_errors.clone()
    }

    /// 每一次 `wait_for_event` 使用的超时毫秒数
    pub fn event_wait_timeouts(&self) -> Vec<u32> {
        self.state.borrow().event_wait_timeouts.clone()
    }

    pub fn executed_draw_count(&self) -> u64 {
        self.state.borrow().draw_count
    }

    pub fn present_count(&self, swap_chain: SwapChainHandle) -> u64 {
        match self.state.borrow().objects.get(swap_chain.raw()) {
            Some(NullObject::SwapChain(swap_chain)) => swap_chain.present_count,
            _ => 0,
        }
    }

    pub fn swap_chain_extent(&self, swap_chain: SwapChainHandle) -> Option<crate::native::GfxExtent2D> {
        match self.state.borrow().objects.get(swap_chain.raw()) {
            Some(NullObject::SwapChain(swap_chain)) => Some(swap_chain.desc.extent),
            _ => None,
        }
    }

    /// 记录一次调用，并检查是否注入了失败
    fn enter(&self, operation: &'static str) -> NativeResult<()> {
        let mut state = self.state.borrow_mut();
        *state.call_counts.entry(operation).or_default() += 1;
        match state.injected_failures.remove(operation) {
            Some(status) => {
                log::debug!("null driver: injected failure {} for {}", status, operation);
                Err(status)
            }
            None => Ok(()),
        }
    }

    fn enter_infallible(&self, operation: &'static str) {
        *self.state.borrow_mut().call_counts.entry(operation).or_default() += 1;
    }
}

// state helpers
impl NullState {
    fn check_kind(&self, raw: u64, kind_name: &str) -> NativeResult<()> {
        match self.objects.get(raw) {
            Some(object) if object.kind_name() == kind_name => Ok(()),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    /// 命令引用的原生对象必须仍然存活
    fn check_command(&self, command: &NativeCommand) -> NativeResult<()> {
        match command {
            NativeCommand::ResourceBarrier(barriers) => {
                barriers.iter().try_for_each(|barrier| self.check_kind(barrier.resource.raw(), "Resource"))
            }
            NativeCommand::SetGraphicsRootSignature(root_signature) => {
                self.check_kind(root_signature.raw(), "RootSignature")
            }
            NativeCommand::SetPipelineState(pipeline) => self.check_kind(pipeline.raw(), "PipelineState"),
            NativeCommand::SetDescriptorHeaps(heaps) => {
                heaps.iter().try_for_each(|heap| self.check_kind(heap.raw(), "DescriptorHeap"))
            }
            NativeCommand::CopyBufferRegion { dst, src, .. } | NativeCommand::CopyTextureRegion { dst, src, .. } => {
                self.check_kind(dst.raw(), "Resource")?;
                self.check_kind(src.raw(), "Resource")
            }
            _ => Ok(()),
        }
    }

    fn resource(&self, raw: u64) -> NativeResult<&NullResource> {
        match self.objects.get(raw) {
            Some(NullObject::Resource(resource)) => Ok(resource),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn resource_mut(&mut self, raw: u64) -> NativeResult<&mut NullResource> {
        match self.objects.get_mut(raw) {
            Some(NullObject::Resource(resource)) => Ok(resource),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn heap_mut(&mut self, raw: u64) -> NativeResult<&mut NullHeap> {
        match self.objects.get_mut(raw) {
            Some(NullObject::Heap(heap)) => Ok(heap),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn fence_mut(&mut self, raw: u64) -> NativeResult<&mut NullFence> {
        match self.objects.get_mut(raw) {
            Some(NullObject::Fence(fence)) => Ok(fence),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn list_mut(&mut self, raw: u64) -> NativeResult<&mut NullCommandList> {
        match self.objects.get_mut(raw) {
            Some(NullObject::CommandList(list)) => Ok(list),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn swap_chain_mut(&mut self, raw: u64) -> NativeResult<&mut NullSwapChain> {
        match self.objects.get_mut(raw) {
            Some(NullObject::SwapChain(swap_chain)) => Ok(swap_chain),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn descriptor_heap(&self, raw: u64) -> Option<&NullDescriptorHeap> {
        match self.objects.get(raw) {
            Some(NullObject::DescriptorHeap(heap)) => Some(heap),
            _ => None,
        }
    }

    fn validation_error(&mut self, message: String) {
        log::warn!("null driver validation: {}", message);
        self.validation_errors.push(message);
    }

    /// 释放一个引用；对象销毁时递归释放它持有的子对象
    fn release(&mut self, raw: u64) -> u32 {
        match self.objects.release(raw) {
            None => {
                self.validation_error(format!("Release on invalid handle {raw:#x}"));
                0
            }
            Some((remaining, None)) => remaining,
            Some((_, Some(object))) => {
                for child in object.owned_refs() {
                    self.release(child);
                }
                0
            }
        }
    }

    fn signal_fence(&mut self, fence: u64, value: u64) {
        let Ok(fence) = self.fence_mut(fence) else {
            return;
        };
        fence.completed = value;
        let (fired, waiting): (Vec<_>, Vec<_>) = fence.waiters.drain(..).partition(|(target, _)| *target <= value);
        fence.waiters = waiting;
        for (_, event) in fired {
            if let Some(NullObject::Event { signaled }) = self.objects.get_mut(event) {
                *signaled = true;
            }
        }
    }

    fn allocation_info(desc: &NativeResourceDesc) -> NativeResult<NativeAllocationInfo> {
        let bytes = Self::content_size(desc)?;
        Ok(NativeAllocationInfo {
            size: align_up(bytes, NULL_PLACEMENT_ALIGNMENT),
            alignment: NULL_PLACEMENT_ALIGNMENT,
        })
    }

    /// 资源内容占用的字节数
    fn content_size(desc: &NativeResourceDesc) -> NativeResult<u64> {
        if desc.width == 0 || desc.height == 0 || desc.depth_or_array_size == 0 {
            return Err(NativeStatus::E_INVALIDARG);
        }
        if desc.is_buffer() {
            return Ok(desc.width);
        }
        Ok(Self::footprint(desc)?.total_bytes())
    }

    fn footprint(desc: &NativeResourceDesc) -> NativeResult<NativeFootprint> {
        let bytes_per_element = desc.format.bytes_per_element();
        if desc.is_buffer() || bytes_per_element == 0 || desc.width > u32::MAX as u64 {
            return Err(NativeStatus::E_INVALIDARG);
        }
        let width = desc.width as u32;
        let depth = match desc.dimension {
            NativeResourceDimension::Texture3D => desc.depth_or_array_size as u32,
            _ => 1,
        };
        let row_pitch = (width * bytes_per_element).div_ceil(TEXTURE_PITCH_ALIGNMENT) * TEXTURE_PITCH_ALIGNMENT;
        Ok(NativeFootprint {
            offset: 0,
            format: desc.format,
            width,
            height: desc.height,
            depth,
            row_pitch,
        })
    }

    fn create_swap_chain_buffers(&mut self, desc: &NativeSwapChainDesc) -> Vec<u64> {
        (0..desc.buffer_count)
            .map(|_| {
                let resource_desc = NativeResourceDesc::texture(
                    NativeResourceDimension::Texture2D,
                    desc.extent.width,
                    desc.extent.height,
                    1,
                    desc.format,
                );
                self.objects.insert(NullObject::Resource(NullResource {
                    desc: resource_desc,
                    heap: None,
                    offset: 0,
                    size: 0,
                    state: ResourceState::PRESENT,
                    map_count: 0,
                    gpu_address: 0,
                }))
            })
            .collect()
    }

    fn read_bytes(&mut self, raw: u64, offset: u64, size: u64) -> Result<Vec<u8>, String> {
        let (heap, start) = self.resource_span(raw, offset, size)?;
        let heap = self.heap_mut(heap).map_err(|_| format!("resource {raw:#x} lost its heap"))?;
        Ok(heap.memory[start..start + size as usize].to_vec())
    }

    fn write_bytes(&mut self, raw: u64, offset: u64, bytes: &[u8]) -> Result<(), String> {
        let (heap, start) = self.resource_span(raw, offset, bytes.len() as u64)?;
        let heap = self.heap_mut(heap).map_err(|_| format!("resource {raw:#x} lost its heap"))?;
        heap.memory[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// 检查 `[offset, offset + size)` 在资源范围内，返回 (heap, heap 内的起始字节)
    fn resource_span(&self, raw: u64, offset: u64, size: u64) -> Result<(u64, usize), String> {
        let resource = self.resource(raw).map_err(|_| format!("invalid resource {raw:#x}"))?;
        let heap = resource.heap.ok_or_else(|| format!("resource {raw:#x} has no backing memory"))?;
        if offset.checked_add(size).is_none_or(|end| end > resource.size) {
            return Err(format!(
                "range [{offset}, {offset}+{size}) out of bounds of resource {raw:#x} ({} bytes)",
                resource.size
            ));
        }
        Ok((heap, (resource.offset + offset) as usize))
    }

    fn expect_state(&mut self, operation: &str, raw: u64, required: ResourceState) {
        let actual = match self.resource(raw) {
            Ok(resource) => resource.state,
            Err(_) => {
                self.validation_error(format!("{operation}: invalid resource {raw:#x}"));
                return;
            }
        };
        if !actual.contains(required) {
            self.validation_error(format!("{operation}: resource {raw:#x} is in {actual:?}, requires {required:?}"));
        }
    }

    /// 在 GPU 时间线上执行一条命令
    fn execute_command(&mut self, command: &NativeCommand) {
        match command {
            NativeCommand::ResourceBarrier(barriers) => {
                for barrier in barriers {
                    let raw = barrier.resource.raw();
                    let actual = match self.resource_mut(raw) {
                        Ok(resource) => std::mem::replace(&mut resource.state, barrier.after),
                        Err(_) => {
                            self.validation_error(format!("ResourceBarrier: invalid resource {raw:#x}"));
                            continue;
                        }
                    };
                    if actual != barrier.before {
                        self.validation_error(format!(
                            "ResourceBarrier: resource {raw:#x} is in {actual:?}, barrier expects {:?}",
                            barrier.before
                        ));
                    }
                }
            }
            NativeCommand::CopyBufferRegion {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => {
                self.expect_state("CopyBufferRegion", src.raw(), ResourceState::COPY_SOURCE);
                self.expect_state("CopyBufferRegion", dst.raw(), ResourceState::COPY_DEST);
                let result = self
                    .read_bytes(src.raw(), *src_offset, *size)
                    .and_then(|bytes| self.write_bytes(dst.raw(), *dst_offset, &bytes));
                if let Err(message) = result {
                    self.validation_error(format!("CopyBufferRegion: {message}"));
                }
            }
            NativeCommand::CopyTextureRegion { dst, src, footprint } => {
                self.expect_state("CopyTextureRegion", src.raw(), ResourceState::COPY_SOURCE);
                self.expect_state("CopyTextureRegion", dst.raw(), ResourceState::COPY_DEST);
                let result = self
                    .read_bytes(src.raw(), footprint.offset, footprint.total_bytes())
                    .and_then(|bytes| self.write_bytes(dst.raw(), 0, &bytes));
                if let Err(message) = result {
                    self.validation_error(format!("CopyTextureRegion: {message}"));
                }
            }
            NativeCommand::DrawInstanced { .. } | NativeCommand::DrawIndexedInstanced { .. } => {
                self.draw_count += 1;
            }
            _ => {}
        }
    }
}

impl NativeDriver for NullDriver {
    fn backend_name(&self) -> &'static str {
        "null"
    }

    fn add_ref(&self, raw: u64) -> u32 {
        let mut state = self.state.borrow_mut();
        match state.objects.add_ref(raw) {
            Some(count) => count,
            None => {
                state.validation_error(format!("AddRef on invalid handle {raw:#x}"));
                0
            }
        }
    }

    fn release(&self, raw: u64) -> u32 {
        self.state.borrow_mut().release(raw)
    }

    fn create_factory(&self, enable_debug_layer: bool) -> NativeResult<FactoryHandle> {
        self.enter("CreateDXGIFactory2")?;
        if enable_debug_layer {
            log::debug!("null driver: debug layer requested, validation is always on");
        }
        let raw = self.state.borrow_mut().objects.insert(NullObject::Factory {
            _debug_layer: enable_debug_layer,
        });
        Ok(FactoryHandle::from_raw(raw))
    }

    fn enum_adapter(&self, factory: FactoryHandle, index: u32) -> NativeResult<AdapterHandle> {
        self.enter("EnumAdapters1")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(factory.raw(), "Factory")?;
        let desc = state.adapters.get(index as usize).ok_or(NativeStatus::DXGI_ERROR_NOT_FOUND)?.to_desc();
        Ok(AdapterHandle::from_raw(state.objects.insert(NullObject::Adapter { desc })))
    }

    fn adapter_desc(&self, adapter: AdapterHandle) -> NativeResult<NativeAdapterDesc> {
        self.enter("GetDesc1")?;
        match self.state.borrow().objects.get(adapter.raw()) {
            Some(NullObject::Adapter { desc }) => Ok(*desc),
            _ => Err(NativeStatus::E_INVALIDARG),
        }
    }

    fn create_device(&self, adapter: AdapterHandle) -> NativeResult<DeviceHandle> {
        self.enter("D3D12CreateDevice")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(adapter.raw(), "Adapter")?;
        Ok(DeviceHandle::from_raw(state.objects.insert(NullObject::Device)))
    }

    fn create_command_queue(&self, device: DeviceHandle) -> NativeResult<QueueHandle> {
        self.enter("CreateCommandQueue")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        Ok(QueueHandle::from_raw(state.objects.insert(NullObject::Queue)))
    }

    fn resource_allocation_info(
        &self,
        device: DeviceHandle,
        desc: &NativeResourceDesc,
    ) -> NativeResult<NativeAllocationInfo> {
        self.enter("GetResourceAllocationInfo")?;
        self.state.borrow().check_kind(device.raw(), "Device")?;
        NullState::allocation_info(desc)
    }

    fn copyable_footprint(&self, device: DeviceHandle, desc: &NativeResourceDesc) -> NativeResult<NativeFootprint> {
        self.enter("GetCopyableFootprints")?;
        self.state.borrow().check_kind(device.raw(), "Device")?;
        NullState::footprint(desc)
    }

    fn create_swap_chain(
        &self,
        factory: FactoryHandle,
        queue: QueueHandle,
        _window: Option<RawWindowHandle>,
        desc: &NativeSwapChainDesc,
    ) -> NativeResult<SwapChainHandle> {
        self.enter("CreateSwapChainForHwnd")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(factory.raw(), "Factory")?;
        state.check_kind(queue.raw(), "CommandQueue")?;
        if !(2..=16).contains(&desc.buffer_count) || desc.extent.is_empty() || desc.format == GfxFormat::Unknown {
            return Err(NativeStatus::E_INVALIDARG);
        }

        let buffers = state.create_swap_chain_buffers(desc);
        let raw = state.objects.insert(NullObject::SwapChain(NullSwapChain {
            desc: *desc,
            buffers,
            current_index: 0,
            present_count: 0,
        }));
        Ok(SwapChainHandle::from_raw(raw))
    }

    fn swap_chain_buffer(&self, swap_chain: SwapChainHandle, index: u32) -> NativeResult<ResourceHandle> {
        self.enter("GetBuffer")?;
        let mut state = self.state.borrow_mut();
        let buffer = *state.swap_chain_mut(swap_chain.raw())?.buffers.get(index as usize).ok_or(NativeStatus::E_INVALIDARG)?;
        state.objects.add_ref(buffer);
        Ok(ResourceHandle::from_raw(buffer))
    }

    fn swap_chain_current_back_buffer_index(&self, swap_chain: SwapChainHandle) -> u32 {
        self.enter_infallible("GetCurrentBackBufferIndex");
        self.state.borrow_mut().swap_chain_mut(swap_chain.raw()).map(|sc| sc.current_index).unwrap_or(0)
    }

    fn swap_chain_present(&self, swap_chain: SwapChainHandle, sync_interval: u32) -> NativeResult<()> {
        self.enter("Present")?;
        if sync_interval > 4 {
            return Err(NativeStatus::E_INVALIDARG);
        }
        let mut state = self.state.borrow_mut();
        let swap_chain = state.swap_chain_mut(swap_chain.raw())?;
        let back_buffer = swap_chain.buffers[swap_chain.current_index as usize];
        swap_chain.present_count += 1;
        swap_chain.current_index = (swap_chain.current_index + 1) % swap_chain.desc.buffer_count;

        let back_buffer_state = state.resource(back_buffer)?.state;
        if back_buffer_state != ResourceState::PRESENT {
            state.validation_error(format!(
                "Present: back buffer {back_buffer:#x} is in {back_buffer_state:?}, requires PRESENT"
            ));
        }
        Ok(())
    }

    fn swap_chain_resize_buffers(&self, swap_chain: SwapChainHandle, desc: &NativeSwapChainDesc) -> NativeResult<()> {
        self.enter("ResizeBuffers")?;
        let mut state = self.state.borrow_mut();
        let old_desc = state.swap_chain_mut(swap_chain.raw())?.desc;
        let old_buffers = state.swap_chain_mut(swap_chain.raw())?.buffers.clone();
        if desc.extent.is_empty() {
            return Err(NativeStatus::E_INVALIDARG);
        }
        // 除了 swap chain 自身的引用，不能还有别的引用
        if old_buffers.iter().any(|&buffer| state.objects.ref_count(buffer) != Some(1)) {
            return Err(NativeStatus::DXGI_ERROR_INVALID_CALL);
        }

        let new_desc = NativeSwapChainDesc {
            extent: desc.extent,
            format: if desc.format == GfxFormat::Unknown { old_desc.format } else { desc.format },
            buffer_count: if desc.buffer_count == 0 { old_desc.buffer_count } else { desc.buffer_count },
        };
        for buffer in old_buffers {
            state.release(buffer);
        }
        let buffers = state.create_swap_chain_buffers(&new_desc);
        let swap_chain = state.swap_chain_mut(swap_chain.raw())?;
        swap_chain.desc = new_desc;
        swap_chain.buffers = buffers;
        swap_chain.current_index = 0;
        Ok(())
    }

    fn create_heap(&self, device: DeviceHandle, desc: &NativeHeapDesc) -> NativeResult<HeapHandle> {
        self.enter("CreateHeap")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        if desc.size == 0 || desc.alignment != NULL_PLACEMENT_ALIGNMENT || desc.size % desc.alignment != 0 {
            return Err(NativeStatus::E_INVALIDARG);
        }
        let size = usize::try_from(desc.size).map_err(|_| NativeStatus::E_OUTOFMEMORY)?;

        let gpu_base = state.next_gpu_address;
        state.next_gpu_address += desc.size;
        let raw = state.objects.insert(NullObject::Heap(NullHeap {
            desc: *desc,
            memory: vec![0; size],
            gpu_base,
        }));
        Ok(HeapHandle::from_raw(raw))
    }

    fn create_placed_resource(
        &self,
        device: DeviceHandle,
        heap: HeapHandle,
        offset: u64,
        desc: &NativeResourceDesc,
        initial_state: ResourceState,
    ) -> NativeResult<ResourceHandle> {
        self.enter("CreatePlacedResource")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        let info = NullState::allocation_info(desc)?;
        let size = NullState::content_size(desc)?;

        let heap_raw = heap.raw();
        let heap = state.heap_mut(heap_raw)?;
        let category_matches = match heap.desc.category {
            NativeHeapCategory::Buffers => desc.is_buffer(),
            NativeHeapCategory::Textures => !desc.is_buffer(),
        };
        let state_matches = match heap.desc.kind {
            NativeHeapKind::Default => true,
            NativeHeapKind::Upload => initial_state == ResourceState::GENERIC_READ,
            NativeHeapKind::Readback => initial_state == ResourceState::COPY_DEST,
        };
        if offset % info.alignment != 0 || offset + info.size > heap.desc.size || !category_matches || !state_matches {
            return Err(NativeStatus::E_INVALIDARG);
        }
        let gpu_address = if desc.is_buffer() { heap.gpu_base + offset } else { 0 };

        // placed resource 让 heap 保持存活
        state.objects.add_ref(heap_raw);
        let raw = state.objects.insert(NullObject::Resource(NullResource {
            desc: *desc,
            heap: Some(heap_raw),
            offset,
            size,
            state: initial_state,
            map_count: 0,
            gpu_address,
        }));
        Ok(ResourceHandle::from_raw(raw))
    }

    fn map_resource(&self, resource: ResourceHandle, _read_range: Option<Range<usize>>) -> NativeResult<*mut u8> {
        self.enter("Map")?;
        let mut state = self.state.borrow_mut();
        let (heap, offset) = {
            let resource = state.resource_mut(resource.raw())?;
            let heap = resource.heap.ok_or(NativeStatus::E_INVALIDARG)?;
            (heap, resource.offset as usize)
        };
        let heap = state.heap_mut(heap)?;
        if heap.desc.kind == NativeHeapKind::Default {
            return Err(NativeStatus::E_INVALIDARG);
        }
        let ptr = heap.memory[offset..].as_mut_ptr();
        state.resource_mut(resource.raw())?.map_count += 1;
        Ok(ptr)
    }

    fn unmap_resource(&self, resource: ResourceHandle, _written_range: Option<Range<usize>>) {
        self.enter_infallible("Unmap");
        let mut state = self.state.borrow_mut();
        let was_mapped = match state.resource_mut(resource.raw()) {
            Ok(resource) if resource.map_count > 0 => {
                resource.map_count -= 1;
                true
            }
            _ => false,
        };
        if !was_mapped {
            state.validation_error(format!("Unmap: {resource:?} is not mapped"));
        }
    }

    fn resource_gpu_address(&self, resource: ResourceHandle) -> u64 {
        self.state.borrow().resource(resource.raw()).map(|r| r.gpu_address).unwrap_or(0)
    }

    fn create_descriptor_heap(
        &self,
        device: DeviceHandle,
        kind: NativeDescriptorHeapKind,
        count: u32,
        shader_visible: bool,
    ) -> NativeResult<DescriptorHeapHandle> {
        self.enter("CreateDescriptorHeap")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        if count == 0 || (shader_visible && kind == NativeDescriptorHeapKind::Rtv) {
            return Err(NativeStatus::E_INVALIDARG);
        }

        let start = state.next_descriptor_address;
        state.next_descriptor_address += align_up(count as u64 * self.descriptor_increment_size(device, kind) as u64, 0x1000);
        let raw = state.objects.insert(NullObject::DescriptorHeap(NullDescriptorHeap {
            _kind: kind,
            _count: count,
            cpu_start: CpuDescriptor(start),
            gpu_start: if shader_visible { GpuDescriptor(start) } else { GpuDescriptor(0) },
        }));
        Ok(DescriptorHeapHandle::from_raw(raw))
    }

    fn descriptor_increment_size(&self, _device: DeviceHandle, kind: NativeDescriptorHeapKind) -> u32 {
        match kind {
            NativeDescriptorHeapKind::Rtv => RTV_DESCRIPTOR_SIZE,
            NativeDescriptorHeapKind::CbvSrvUav => CBV_SRV_UAV_DESCRIPTOR_SIZE,
        }
    }

    fn descriptor_heap_cpu_start(&self, heap: DescriptorHeapHandle) -> CpuDescriptor {
        self.state.borrow().descriptor_heap(heap.raw()).map(|h| h.cpu_start).unwrap_or(CpuDescriptor(0))
    }

    fn descriptor_heap_gpu_start(&self, heap: DescriptorHeapHandle) -> GpuDescriptor {
        self.state.borrow().descriptor_heap(heap.raw()).map(|h| h.gpu_start).unwrap_or(GpuDescriptor(0))
    }

    fn create_render_target_view(&self, _device: DeviceHandle, resource: ResourceHandle, _dest: CpuDescriptor) {
        self.enter_infallible("CreateRenderTargetView");
        let mut state = self.state.borrow_mut();
        match state.resource(resource.raw()).map(|r| r.desc.is_buffer()) {
            Ok(false) => {}
            Ok(true) => state.validation_error(format!("CreateRenderTargetView: {resource:?} is a buffer")),
            Err(_) => state.validation_error(format!("CreateRenderTargetView: invalid {resource:?}")),
        }
    }

    fn create_shader_resource_view(
        &self,
        _device: DeviceHandle,
        resource: ResourceHandle,
        _desc: &NativeShaderResourceViewDesc,
        _dest: CpuDescriptor,
    ) {
        self.enter_infallible("CreateShaderResourceView");
        let mut state = self.state.borrow_mut();
        if state.resource(resource.raw()).is_err() {
            state.validation_error(format!("CreateShaderResourceView: invalid {resource:?}"));
        }
    }

    fn create_root_signature(
        &self,
        device: DeviceHandle,
        desc: &NativeRootSignatureDesc,
    ) -> NativeResult<RootSignatureHandle> {
        self.enter("CreateRootSignature")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        let raw = state.objects.insert(NullObject::RootSignature { _desc: desc.clone() });
        Ok(RootSignatureHandle::from_raw(raw))
    }

    fn create_graphics_pipeline_state(
        &self,
        device: DeviceHandle,
        desc: &NativeGraphicsPipelineDesc<'_>,
    ) -> NativeResult<PipelineStateHandle> {
        self.enter("CreateGraphicsPipelineState")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        state.check_kind(desc.root_signature.raw(), "RootSignature")?;
        if desc.vertex_shader.is_none_or(|bytecode| bytecode.is_empty())
            || desc.render_target_format == GfxFormat::Unknown
        {
            return Err(NativeStatus::E_INVALIDARG);
        }
        Ok(PipelineStateHandle::from_raw(state.objects.insert(NullObject::PipelineState)))
    }

    fn create_fence(&self, device: DeviceHandle, initial_value: u64) -> NativeResult<FenceHandle> {
        self.enter("CreateFence")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        let raw = state.objects.insert(NullObject::Fence(NullFence {
            completed: initial_value,
            waiters: vec![],
        }));
        Ok(FenceHandle::from_raw(raw))
    }

    fn fence_completed_value(&self, fence: FenceHandle) -> u64 {
        self.enter_infallible("GetCompletedValue");
        self.state.borrow_mut().fence_mut(fence.raw()).map(|f| f.completed).unwrap_or(u64::MAX)
    }

    fn fence_set_event_on_completion(&self, fence: FenceHandle, value: u64, event: EventHandle) -> NativeResult<()> {
        self.enter("SetEventOnCompletion")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(event.raw(), "Event")?;
        let fence = state.fence_mut(fence.raw())?;
        if fence.completed >= value {
            if let Some(NullObject::Event { signaled }) = state.objects.get_mut(event.raw()) {
                *signaled = true;
            }
        } else {
            fence.waiters.push((value, event.raw()));
        }
        Ok(())
    }

    fn queue_signal(&self, queue: QueueHandle, fence: FenceHandle, value: u64) -> NativeResult<()> {
        self.enter("Signal")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(queue.raw(), "CommandQueue")?;
        state.check_kind(fence.raw(), "Fence")?;
        if state.auto_complete {
            state.signal_fence(fence.raw(), value);
        } else {
            state.pending_signals.push((fence.raw(), value));
        }
        Ok(())
    }

    fn create_event(&self) -> NativeResult<EventHandle> {
        self.enter("CreateEventW")?;
        let raw = self.state.borrow_mut().objects.insert(NullObject::Event { signaled: false });
        Ok(EventHandle::from_raw(raw))
    }

    fn wait_for_event(&self, event: EventHandle, timeout_ms: u32) -> NativeResult<NativeWaitStatus> {
        self.enter("WaitForSingleObject")?;
        let mut state = self.state.borrow_mut();
        state.event_wait_timeouts.push(timeout_ms);
        let signaled = match state.objects.get_mut(event.raw()) {
            Some(NullObject::Event { signaled }) => std::mem::take(signaled),
            _ => return Err(NativeStatus::WAIT_FAILED),
        };
        if signaled {
            return Ok(NativeWaitStatus::Signaled);
        }
        if timeout_ms == INFINITE_WAIT_MS {
            // 单线程的软件实现里没有别人能 signal 这个 event
            state.validation_error(format!("WaitForSingleObject: infinite wait on {event:?} would never return"));
            return Err(NativeStatus::WAIT_FAILED);
        }
        Ok(NativeWaitStatus::Timeout)
    }

    fn create_command_allocator(&self, device: DeviceHandle) -> NativeResult<CommandAllocatorHandle> {
        self.enter("CreateCommandAllocator")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        Ok(CommandAllocatorHandle::from_raw(state.objects.insert(NullObject::CommandAllocator)))
    }

    fn reset_command_allocator(&self, allocator: CommandAllocatorHandle) -> NativeResult<()> {
        self.enter("ID3D12CommandAllocator::Reset")?;
        self.state.borrow().check_kind(allocator.raw(), "CommandAllocator")
    }

    fn create_command_list(
        &self,
        device: DeviceHandle,
        allocator: CommandAllocatorHandle,
    ) -> NativeResult<CommandListHandle> {
        self.enter("CreateCommandList")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(device.raw(), "Device")?;
        state.check_kind(allocator.raw(), "CommandAllocator")?;
        let raw = state.objects.insert(NullObject::CommandList(NullCommandList {
            open: false,
            commands: vec![],
            reset_count: 0,
            close_count: 0,
            poisoned: false,
        }));
        Ok(CommandListHandle::from_raw(raw))
    }

    fn reset_command_list(
        &self,
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
        initial_pipeline: Option<PipelineStateHandle>,
    ) -> NativeResult<()> {
        self.enter("ID3D12GraphicsCommandList::Reset")?;
        let mut state = self.state.borrow_mut();
        state.check_kind(allocator.raw(), "CommandAllocator")?;
        if let Some(pipeline) = initial_pipeline {
            state.check_kind(pipeline.raw(), "PipelineState")?;
        }
        let list = state.list_mut(list.raw())?;
        if list.open {
            return Err(NativeStatus::E_FAIL);
        }
        list.open = true;
        list.poisoned = false;
        list.commands.clear();
        list.reset_count += 1;
        Ok(())
    }

    fn close_command_list(&self, list: CommandListHandle) -> NativeResult<()> {
        self.enter("Close")?;
        let mut state = self.state.borrow_mut();
        let list = state.list_mut(list.raw())?;
        if !list.open {
            return Err(NativeStatus::E_FAIL);
        }
        list.open = false;
        list.close_count += 1;
        if std::mem::take(&mut list.poisoned) {
            return Err(NativeStatus::E_FAIL);
        }
        Ok(())
    }

    fn record_command(&self, list: CommandListHandle, command: NativeCommand) {
        self.enter_infallible(command.name());
        let mut state = self.state.borrow_mut();
        if let Err(status) = state.check_command(&command) {
            state.validation_error(format!("{}: {status} while recording into {list:?}", command.name()));
            if let Ok(native_list) = state.list_mut(list.raw()) {
                native_list.poisoned = true;
            }
            return;
        }
        match state.list_mut(list.raw()) {
            Ok(native_list) if native_list.open => native_list.commands.push(command),
            Ok(_) => state.validation_error(format!("{}: {list:?} is closed", command.name())),
            Err(_) => state.validation_error(format!("{}: invalid {list:?}", command.name())),
        }
    }

    fn execute_command_lists(&self, queue: QueueHandle, lists: &[CommandListHandle]) {
        self.enter_infallible("ExecuteCommandLists");
        let mut state = self.state.borrow_mut();
        if state.check_kind(queue.raw(), "CommandQueue").is_err() {
            state.validation_error(format!("ExecuteCommandLists: invalid {queue:?}"));
            return;
        }
        for &list in lists {
            let commands = match state.list_mut(list.raw()) {
                Ok(native_list) if !native_list.open => native_list.commands.clone(),
                Ok(_) => {
                    state.validation_error(format!("ExecuteCommandLists: {list:?} is still open"));
                    continue;
                }
                Err(_) => {
                    state.validation_error(format!("ExecuteCommandLists: invalid {list:?}"));
                    continue;
                }
            };
            for command in &commands {
                state.execute_command(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{GfxExtent2D, NativeResourceBarrier, ALL_SUBRESOURCES};

    fn device(driver: &NullDriver) -> (FactoryHandle, DeviceHandle, QueueHandle) {
        let factory = driver.create_factory(false).unwrap();
        let adapter = driver.enum_adapter(factory, 0).unwrap();
        let device = driver.create_device(adapter).unwrap();
        let queue = driver.create_command_queue(device).unwrap();
        driver.release(adapter.raw());
        (factory, device, queue)
    }

    fn heap(driver: &NullDriver, device: DeviceHandle, kind: NativeHeapKind) -> HeapHandle {
        let desc = NativeHeapDesc {
            size: 4 * NULL_PLACEMENT_ALIGNMENT,
            alignment: NULL_PLACEMENT_ALIGNMENT,
            kind,
            category: NativeHeapCategory::Buffers,
        };
        driver.create_heap(device, &desc).unwrap()
    }

    #[test]
    fn test_enum_adapter_past_end() {
        let driver = NullDriver::new();
        let factory = driver.create_factory(true).unwrap();
        assert!(driver.enum_adapter(factory, 0).is_ok());
        assert_eq!(driver.enum_adapter(factory, 1), Err(NativeStatus::DXGI_ERROR_NOT_FOUND));
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let driver = NullDriver::new();
        driver.fail_next_call("CreateDXGIFactory2", NativeStatus::E_FAIL);
        assert_eq!(driver.create_factory(false), Err(NativeStatus::E_FAIL));
        assert!(driver.create_factory(false).is_ok());
        assert_eq!(driver.call_count("CreateDXGIFactory2"), 2);
    }

    #[test]
    fn test_placed_resource_keeps_heap_alive() {
        let driver = NullDriver::new();
        let (factory, device, queue) = device(&driver);
        let heap = heap(&driver, device, NativeHeapKind::Upload);
        let buffer = driver
            .create_placed_resource(device, heap, 0, &NativeResourceDesc::buffer(256), ResourceState::GENERIC_READ)
            .unwrap();

        assert_eq!(driver.release(heap.raw()), 1);
        assert_eq!(driver.release(buffer.raw()), 0);
        assert_eq!(driver.ref_count(heap.raw()), None);

        for raw in [queue.raw(), device.raw(), factory.raw()] {
            driver.release(raw);
        }
        assert_eq!(driver.live_object_count(), 0);
    }

    #[test]
    fn test_placed_resource_rejects_bad_placement() {
        let driver = NullDriver::new();
        let (_, device, _) = device(&driver);
        let heap = heap(&driver, device, NativeHeapKind::Upload);
        let desc = NativeResourceDesc::buffer(256);

        // 未对齐
        assert!(driver.create_placed_resource(device, heap, 256, &desc, ResourceState::GENERIC_READ).is_err());
        // 超出 heap
        let end = 4 * NULL_PLACEMENT_ALIGNMENT;
        assert!(driver.create_placed_resource(device, heap, end, &desc, ResourceState::GENERIC_READ).is_err());
        // upload heap 只接受 GENERIC_READ
        assert!(driver.create_placed_resource(device, heap, 0, &desc, ResourceState::COMMON).is_err());
    }

    #[test]
    fn test_map_default_heap_is_rejected() {
        let driver = NullDriver::new();
        let (_, device, _) = device(&driver);
        let heap = heap(&driver, device, NativeHeapKind::Default);
        let buffer = driver
            .create_placed_resource(device, heap, 0, &NativeResourceDesc::buffer(16), ResourceState::COMMON)
            .unwrap();
        assert_eq!(driver.map_resource(buffer, None), Err(NativeStatus::E_INVALIDARG));
    }

    #[test]
    fn test_swap_chain_index_cycles() {
        let driver = NullDriver::new();
        let (factory, _, queue) = device(&driver);
        let desc = NativeSwapChainDesc {
            extent: GfxExtent2D::new(64, 64),
            format: GfxFormat::B8G8R8A8Unorm,
            buffer_count: 3,
        };
        let swap_chain = driver.create_swap_chain(factory, queue, None, &desc).unwrap();

        let indices = (0..4)
            .map(|_| {
                driver.swap_chain_present(swap_chain, 1).unwrap();
                driver.swap_chain_current_back_buffer_index(swap_chain)
            })
            .collect_vec();
        assert_eq!(indices, vec![1, 2, 0, 1]);
        assert_eq!(driver.present_count(swap_chain), 4);
    }

    #[test]
    fn test_resize_requires_released_buffers() {
        let driver = NullDriver::new();
        let (factory, _, queue) = device(&driver);
        let desc = NativeSwapChainDesc {
            extent: GfxExtent2D::new(64, 64),
            format: GfxFormat::B8G8R8A8Unorm,
            buffer_count: 2,
        };
        let swap_chain = driver.create_swap_chain(factory, queue, None, &desc).unwrap();
        let buffer = driver.swap_chain_buffer(swap_chain, 0).unwrap();

        let resized = NativeSwapChainDesc {
            extent: GfxExtent2D::new(128, 32),
            ..desc
        };
        assert_eq!(
            driver.swap_chain_resize_buffers(swap_chain, &resized),
            Err(NativeStatus::DXGI_ERROR_INVALID_CALL)
        );

        driver.release(buffer.raw());
        driver.swap_chain_resize_buffers(swap_chain, &resized).unwrap();
        assert_eq!(driver.swap_chain_extent(swap_chain), Some(GfxExtent2D::new(128, 32)));
        assert_eq!(driver.swap_chain_current_back_buffer_index(swap_chain), 0);
    }

    #[test]
    fn test_deferred_signal_and_event() {
        let driver = NullDriver::new();
        let (_, device, queue) = device(&driver);
        let fence = driver.create_fence(device, 0).unwrap();
        let event = driver.create_event().unwrap();
        driver.set_auto_complete(false);

        driver.queue_signal(queue, fence, 1).unwrap();
        driver.fence_set_event_on_completion(fence, 1, event).unwrap();
        assert_eq!(driver.fence_completed_value(fence), 0);
        assert_eq!(driver.wait_for_event(event, 10), Ok(NativeWaitStatus::Timeout));

        driver.complete_pending_work();
        assert_eq!(driver.fence_completed_value(fence), 1);
        assert_eq!(driver.wait_for_event(event, 10), Ok(NativeWaitStatus::Signaled));
        // auto reset
        assert_eq!(driver.wait_for_event(event, 10), Ok(NativeWaitStatus::Timeout));
        assert_eq!(driver.event_wait_timeouts(), vec![10, 10, 10]);
    }

    #[test]
    fn test_barrier_mismatch_is_reported() {
        let driver = NullDriver::new();
        let (_, device, queue) = device(&driver);
        let heap = heap(&driver, device, NativeHeapKind::Default);
        let buffer = driver
            .create_placed_resource(device, heap, 0, &NativeResourceDesc::buffer(16), ResourceState::COMMON)
            .unwrap();
        let allocator = driver.create_command_allocator(device).unwrap();
        let list = driver.create_command_list(device, allocator).unwrap();

        driver.reset_command_list(list, allocator, None).unwrap();
        driver.record_command(
            list,
            NativeCommand::ResourceBarrier(vec![NativeResourceBarrier {
                resource: buffer,
                subresource: ALL_SUBRESOURCES,
                before: ResourceState::COPY_DEST,
                after: ResourceState::COPY_SOURCE,
            }]),
        );
        driver.close_command_list(list).unwrap();
        driver.execute_command_lists(queue, &[list]);

        assert_eq!(driver.validation_errors().len(), 1);
        assert_eq!(driver.resource_state(buffer), Some(ResourceState::COPY_SOURCE));
    }

    #[test]
    fn test_command_list_state() {
        let driver = NullDriver::new();
        let (_, device, queue) = device(&driver);
        let allocator = driver.create_command_allocator(device).unwrap();
        let list = driver.create_command_list(device, allocator).unwrap();

        // 创建后是 closed
        assert_eq!(driver.close_command_list(list), Err(NativeStatus::E_FAIL));
        driver.reset_command_list(list, allocator, None).unwrap();
        assert_eq!(driver.reset_command_list(list, allocator, None), Err(NativeStatus::E_FAIL));

        driver.execute_command_lists(queue, &[list]);
        assert_eq!(driver.validation_errors().len(), 1);

        driver.close_command_list(list).unwrap();
        let stats = driver.command_list_stats(list).unwrap();
        assert_eq!((stats.reset_count, stats.close_count, stats.is_open), (1, 1, false));
    }

    #[test]
    fn test_completed_value_of_released_fence() {
        let driver = NullDriver::new();
        let (_, device, _) = device(&driver);
        let fence = driver.create_fence(device, 3).unwrap();
        assert_eq!(driver.fence_completed_value(fence), 3);

        // 失效的 fence 视为已完成，等待方不会永远阻塞
        driver.release(fence.raw());
        assert_eq!(driver.fence_completed_value(fence), u64::MAX);
    }

    #[test]
    fn test_command_with_dead_handle_fails_close() {
        let driver = NullDriver::new();
        let (_, device, _) = device(&driver);
        let allocator = driver.create_command_allocator(device).unwrap();
        let list = driver.create_command_list(device, allocator).unwrap();
        // fence 的句柄不是 pipeline
        let pipeline = PipelineStateHandle::from_raw(driver.create_fence(device, 0).unwrap().raw());

        driver.reset_command_list(list, allocator, None).unwrap();
        driver.record_command(list, NativeCommand::SetPipelineState(pipeline));
        driver.record_command(list, NativeCommand::SetPrimitiveTopology(crate::native::PrimitiveTopology::TriangleList));
        assert_eq!(driver.validation_errors().len(), 1);
        assert_eq!(driver.recorded_commands(list).len(), 1);

        assert_eq!(driver.close_command_list(list), Err(NativeStatus::E_FAIL));
        let stats = driver.command_list_stats(list).unwrap();
        assert!(!stats.is_open);

        // reset 之后重新录制的 list 可以正常 close
        driver.reset_command_list(list, allocator, None).unwrap();
        driver.close_command_list(list).unwrap();
    }

    #[test]
    fn test_live_objects_by_kind() {
        let driver = NullDriver::new();
        let (_, device, _) = device(&driver);
        driver.create_fence(device, 0).unwrap();
        driver.create_fence(device, 0).unwrap();

        let live = driver.live_objects();
        assert!(live.contains(&("Fence", 2)));
        assert!(live.contains(&("Device", 1)));
        assert!(!live.iter().any(|(kind, _)| *kind == "Adapter"));
    }
}
