//! 基于 `windows` crate 的 D3D12/DXGI 驱动
//!
//! 每个 COM 对象放在句柄表中，句柄表的引用计数对应 [`NativeDriver::add_ref`] / [`NativeDriver::release`]；
//! 计数归零时 COM 对象随之 Release

mod convert;
mod objects;

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::ops::Range;

use raw_window_handle::RawWindowHandle;
use windows::core::{Interface, PCSTR};
use windows::Win32::Foundation::{HANDLE, HWND, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Graphics::Direct3D::{D3D_FEATURE_LEVEL_11_0, ID3DBlob};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject};

use crate::native::handle_table::HandleTable;
use crate::native::{
    AdapterHandle, CommandAllocatorHandle, CommandListHandle, CpuDescriptor, DescriptorHeapHandle, DeviceHandle,
    EventHandle, FactoryHandle, FenceHandle, GpuDescriptor, HeapHandle, NativeAdapterDesc, NativeAllocationInfo,
    NativeCommand, NativeDescriptorHeapKind, NativeDriver, NativeFootprint, NativeGraphicsPipelineDesc, NativeHandle,
    NativeHeapDesc, NativeResourceBarrier, NativeResourceDesc, NativeResourceDimension, NativeResult,
    NativeRootParameter, NativeRootSignatureDesc, NativeShaderResourceViewDesc, NativeStatus, NativeSwapChainDesc,
    NativeWaitStatus, PipelineStateHandle, QueueHandle, ResourceHandle, ResourceState, RootSignatureHandle,
    SwapChainHandle,
};
use objects::{D3d12Object, FromObject, OwnedEvent};

#[inline]
fn status(err: windows::core::Error) -> NativeStatus {
    NativeStatus(err.code().0)
}

/// windows 上的真实驱动
pub struct D3d12Driver {
    objects: RefCell<HandleTable<D3d12Object>>,
    /// 录制失败过的 command list，下一次 Close 返回失败
    poisoned_lists: RefCell<HashSet<u64>>,
}

// new & init
impl D3d12Driver {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(HandleTable::new()),
            poisoned_lists: RefCell::new(HashSet::new()),
        }
    }
}

impl Default for D3d12Driver {
    fn default() -> Self {
        Self::new()
    }
}

// getters
impl D3d12Driver {
    pub fn live_object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn live_objects(&self) -> Vec<(&'static str, usize)> {
        use itertools::Itertools;
        let objects = self.objects.borrow();
        objects.iter().map(|(_, object)| object.kind_name()).counts().into_iter().sorted().collect()
    }
}

// tools
impl D3d12Driver {
    fn insert(&self, object: D3d12Object) -> u64 {
        self.objects.borrow_mut().insert(object)
    }

    /// clone 出 COM 对象，调用原生方法时不持有句柄表的 borrow
    fn get<T: FromObject>(&self, raw: u64) -> NativeResult<T> {
        self.objects.borrow().get(raw).and_then(T::from_object).ok_or(NativeStatus::E_POINTER)
    }

    /// 不返回错误的原生方法遇到无效句柄时只记录日志
    fn get_or_log<T: FromObject>(&self, raw: u64, operation: &'static str) -> Option<T> {
        let object = self.get(raw).ok();
        if object.is_none() {
            log::error!("{}: invalid handle {:#x}", operation, raw);
        }
        object
    }

    /// `pResource` 持有一个引用，录制之后由调用方取出并释放
    fn transition_barrier(&self, barrier: &NativeResourceBarrier) -> NativeResult<D3D12_RESOURCE_BARRIER> {
        let resource: ID3D12Resource = self.get(barrier.resource.raw())?;
        Ok(D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: ManuallyDrop::new(Some(resource)),
                    StateBefore: convert::resource_state(barrier.before),
                    StateAfter: convert::resource_state(barrier.after),
                    Subresource: barrier.subresource,
                }),
            },
        })
    }

    fn record(&self, list: &ID3D12GraphicsCommandList, command: &NativeCommand) -> NativeResult<()> {
        unsafe {
            match command {
                NativeCommand::ResourceBarrier(barriers) => {
                    let mut native = Vec::with_capacity(barriers.len());
                    for barrier in barriers {
                        native.push(self.transition_barrier(barrier)?);
                    }
                    list.ResourceBarrier(&native);
                    for barrier in native {
                        let transition = ManuallyDrop::into_inner(barrier.Anonymous.Transition);
                        drop(ManuallyDrop::into_inner(transition.pResource));
                    }
                }
                NativeCommand::SetRenderTargets { rtv } => {
                    let rtv = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: rtv.0 as usize };
                    list.OMSetRenderTargets(1, Some(&rtv), false, None);
                }
                NativeCommand::ClearRenderTargetView { rtv, color } => {
                    let rtv = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: rtv.0 as usize };
                    list.ClearRenderTargetView(rtv, &color.to_array(), None);
                }
                NativeCommand::SetViewport(viewport) => list.RSSetViewports(&[convert::viewport(viewport)]),
                NativeCommand::SetScissorRect(rect) => list.RSSetScissorRects(&[convert::rect(rect)]),
                NativeCommand::SetPrimitiveTopology(topology) => {
                    list.IASetPrimitiveTopology(convert::topology(*topology))
                }
                NativeCommand::SetGraphicsRootSignature(root_signature) => {
                    let root_signature: ID3D12RootSignature = self.get(root_signature.raw())?;
                    list.SetGraphicsRootSignature(&root_signature);
                }
                NativeCommand::SetPipelineState(pipeline) => {
                    let pipeline: ID3D12PipelineState = self.get(pipeline.raw())?;
                    list.SetPipelineState(&pipeline);
                }
                NativeCommand::SetDescriptorHeaps(heaps) => {
                    let mut native = Vec::with_capacity(heaps.len());
                    for heap in heaps {
                        native.push(Some(self.get::<ID3D12DescriptorHeap>(heap.raw())?));
                    }
                    list.SetDescriptorHeaps(&native);
                }
                NativeCommand::SetVertexBuffers { start_slot, views } => {
                    let views = views
                        .iter()
                        .map(|view| D3D12_VERTEX_BUFFER_VIEW {
                            BufferLocation: view.gpu_address,
                            SizeInBytes: view.size_in_bytes,
                            StrideInBytes: view.stride_in_bytes,
                        })
                        .collect::<Vec<_>>();
                    list.IASetVertexBuffers(*start_slot, Some(&views));
                }
                NativeCommand::SetIndexBuffer(view) => {
                    let view = D3D12_INDEX_BUFFER_VIEW {
                        BufferLocation: view.gpu_address,
                        SizeInBytes: view.size_in_bytes,
                        Format: convert::format(view.format),
                    };
                    list.IASetIndexBuffer(Some(&view));
                }
                NativeCommand::SetGraphicsRootConstantBufferView { root_index, gpu_address } => {
                    list.SetGraphicsRootConstantBufferView(*root_index, *gpu_address);
                }
                NativeCommand::SetGraphicsRootDescriptorTable { root_index, base } => {
                    list.SetGraphicsRootDescriptorTable(*root_index, D3D12_GPU_DESCRIPTOR_HANDLE { ptr: base.0 });
                }
                NativeCommand::DrawInstanced {
                    vertex_count,
                    instance_count,
                    start_vertex,
                    start_instance,
                } => list.DrawInstanced(*vertex_count, *instance_count, *start_vertex, *start_instance),
                NativeCommand::DrawIndexedInstanced {
                    index_count,
                    instance_count,
                    start_index,
                    base_vertex,
                    start_instance,
                } => list.DrawIndexedInstanced(*index_count, *instance_count, *start_index, *base_vertex, *start_instance),
                NativeCommand::CopyBufferRegion {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => {
                    let dst: ID3D12Resource = self.get(dst.raw())?;
                    let src: ID3D12Resource = self.get(src.raw())?;
                    list.CopyBufferRegion(&dst, *dst_offset, &src, *src_offset, *size);
                }
                NativeCommand::CopyTextureRegion { dst, src, footprint } => {
                    let dst = D3D12_TEXTURE_COPY_LOCATION {
                        pResource: ManuallyDrop::new(Some(self.get::<ID3D12Resource>(dst.raw())?)),
                        Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                        Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { SubresourceIndex: 0 },
                    };
                    let src = D3D12_TEXTURE_COPY_LOCATION {
                        pResource: ManuallyDrop::new(Some(self.get::<ID3D12Resource>(src.raw())?)),
                        Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                        Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                            PlacedFootprint: convert::subresource_footprint(footprint),
                        },
                    };
                    list.CopyTextureRegion(&dst, 0, 0, 0, &src, None);
                    drop(ManuallyDrop::into_inner(dst.pResource));
                    drop(ManuallyDrop::into_inner(src.pResource));
                }
            }
        }
        Ok(())
    }

    fn serialize_root_signature(desc: &D3D12_ROOT_SIGNATURE_DESC) -> NativeResult<ID3DBlob> {
        let mut blob: Option<ID3DBlob> = None;
        let mut error: Option<ID3DBlob> = None;
        let result =
            unsafe { D3D12SerializeRootSignature(desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut blob, Some(&mut error)) };
        if let Some(error) = error {
            let message = unsafe {
                std::slice::from_raw_parts(error.GetBufferPointer() as *const u8, error.GetBufferSize())
            };
            log::error!("D3D12SerializeRootSignature: {}", String::from_utf8_lossy(message));
        }
        result.map_err(status)?;
        blob.ok_or(NativeStatus::E_FAIL)
    }
}

impl NativeDriver for D3d12Driver {
    fn backend_name(&self) -> &'static str {
        "d3d12"
    }

    fn add_ref(&self, raw: u64) -> u32 {
        self.objects.borrow_mut().add_ref(raw).unwrap_or_else(|| {
            log::error!("AddRef: invalid handle {:#x}", raw);
            0
        })
    }

    fn release(&self, raw: u64) -> u32 {
        // COM 对象在 borrow 结束之后才 drop
        let released = self.objects.borrow_mut().release(raw);
        match released {
            Some((remaining, object)) => {
                if let Some(object) = object {
                    log::trace!("destroy {}", object.kind_name());
                    self.poisoned_lists.borrow_mut().remove(&raw);
                }
                remaining
            }
            None => {
                log::error!("Release: invalid handle {:#x}", raw);
                0
            }
        }
    }

    fn create_factory(&self, enable_debug_layer: bool) -> NativeResult<FactoryHandle> {
        let mut flags = DXGI_CREATE_FACTORY_FLAGS(0);
        if enable_debug_layer {
            let mut debug: Option<ID3D12Debug> = None;
            match unsafe { D3D12GetDebugInterface(&mut debug) } {
                Ok(()) => {
                    if let Some(debug) = debug {
                        unsafe { debug.EnableDebugLayer() };
                        flags = DXGI_CREATE_FACTORY_DEBUG;
                        log::info!("D3D12 debug layer enabled");
                    }
                }
                Err(err) => log::warn!("D3D12 debug layer is unavailable: {}", err),
            }
        }
        let factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(flags) }.map_err(status)?;
        Ok(FactoryHandle::from_raw(self.insert(D3d12Object::Factory(factory))))
    }

    fn enum_adapter(&self, factory: FactoryHandle, index: u32) -> NativeResult<AdapterHandle> {
        let factory: IDXGIFactory4 = self.get(factory.raw())?;
        let adapter = unsafe { factory.EnumAdapters1(index) }.map_err(status)?;
        Ok(AdapterHandle::from_raw(self.insert(D3d12Object::Adapter(adapter))))
    }

    fn adapter_desc(&self, adapter: AdapterHandle) -> NativeResult<NativeAdapterDesc> {
        let adapter: IDXGIAdapter1 = self.get(adapter.raw())?;
        let desc = unsafe { adapter.GetDesc1() }.map_err(status)?;
        Ok(NativeAdapterDesc {
            description: desc.Description,
            vendor_id: desc.VendorId,
            device_id: desc.DeviceId,
            sub_sys_id: desc.SubSysId,
            revision: desc.Revision,
            dedicated_video_memory: desc.DedicatedVideoMemory as u64,
            shared_system_memory: desc.SharedSystemMemory as u64,
            is_software: desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0,
        })
    }

    fn create_device(&self, adapter: AdapterHandle) -> NativeResult<DeviceHandle> {
        let adapter: IDXGIAdapter1 = self.get(adapter.raw())?;
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }.map_err(status)?;
        let device = device.ok_or(NativeStatus::E_FAIL)?;
        Ok(DeviceHandle::from_raw(self.insert(D3d12Object::Device(device))))
    }

    fn create_command_queue(&self, device: DeviceHandle) -> NativeResult<QueueHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            })
        }
        .map_err(status)?;
        Ok(QueueHandle::from_raw(self.insert(D3d12Object::Queue(queue))))
    }

    fn resource_allocation_info(
        &self,
        device: DeviceHandle,
        desc: &NativeResourceDesc,
    ) -> NativeResult<NativeAllocationInfo> {
        let device: ID3D12Device = self.get(device.raw())?;
        let info = unsafe { device.GetResourceAllocationInfo(0, &[convert::resource_desc(desc)]) };
        if info.SizeInBytes == u64::MAX {
            return Err(NativeStatus::E_INVALIDARG);
        }
        Ok(NativeAllocationInfo {
            size: info.SizeInBytes,
            alignment: info.Alignment,
        })
    }

    fn copyable_footprint(&self, device: DeviceHandle, desc: &NativeResourceDesc) -> NativeResult<NativeFootprint> {
        let device: ID3D12Device = self.get(device.raw())?;
        let desc = convert::resource_desc(desc);
        let mut layout = D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default();
        let mut total_bytes = 0_u64;
        unsafe { device.GetCopyableFootprints(&desc, 0, 1, 0, Some(&mut layout), None, None, Some(&mut total_bytes)) };
        if total_bytes == u64::MAX {
            return Err(NativeStatus::E_INVALIDARG);
        }
        Ok(convert::native_footprint(&layout))
    }

    fn create_swap_chain(
        &self,
        factory: FactoryHandle,
        queue: QueueHandle,
        window: Option<RawWindowHandle>,
        desc: &NativeSwapChainDesc,
    ) -> NativeResult<SwapChainHandle> {
        let hwnd = match window {
            Some(RawWindowHandle::Win32(handle)) => HWND(handle.hwnd.get() as *mut core::ffi::c_void),
            Some(other) => {
                log::error!("unsupported window handle: {:?}", other);
                return Err(NativeStatus::E_INVALIDARG);
            }
            None => {
                log::error!("d3d12 swap chain needs a window");
                return Err(NativeStatus::E_INVALIDARG);
            }
        };
        let factory: IDXGIFactory4 = self.get(factory.raw())?;
        let queue: ID3D12CommandQueue = self.get(queue.raw())?;
        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: desc.extent.width,
            Height: desc.extent.height,
            Format: convert::format(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: desc.buffer_count,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            ..Default::default()
        };
        let swap_chain = unsafe { factory.CreateSwapChainForHwnd(&queue, hwnd, &swap_chain_desc, None, None) }
            .map_err(status)?;
        let swap_chain: IDXGISwapChain3 = swap_chain.cast().map_err(status)?;
        Ok(SwapChainHandle::from_raw(self.insert(D3d12Object::SwapChain(swap_chain))))
    }

    fn swap_chain_buffer(&self, swap_chain: SwapChainHandle, index: u32) -> NativeResult<ResourceHandle> {
        let swap_chain: IDXGISwapChain3 = self.get(swap_chain.raw())?;
        let buffer: ID3D12Resource = unsafe { swap_chain.GetBuffer(index) }.map_err(status)?;
        Ok(ResourceHandle::from_raw(self.insert(D3d12Object::Resource(buffer))))
    }

    fn swap_chain_current_back_buffer_index(&self, swap_chain: SwapChainHandle) -> u32 {
        self.get_or_log::<IDXGISwapChain3>(swap_chain.raw(), "GetCurrentBackBufferIndex")
            .map(|swap_chain| unsafe { swap_chain.GetCurrentBackBufferIndex() })
            .unwrap_or(0)
    }

    fn swap_chain_present(&self, swap_chain: SwapChainHandle, sync_interval: u32) -> NativeResult<()> {
        let swap_chain: IDXGISwapChain3 = self.get(swap_chain.raw())?;
        unsafe { swap_chain.Present(sync_interval, DXGI_PRESENT(0)) }.ok().map_err(status)
    }

    fn swap_chain_resize_buffers(&self, swap_chain: SwapChainHandle, desc: &NativeSwapChainDesc) -> NativeResult<()> {
        let swap_chain: IDXGISwapChain3 = self.get(swap_chain.raw())?;
        unsafe {
            swap_chain.ResizeBuffers(
                desc.buffer_count,
                desc.extent.width,
                desc.extent.height,
                convert::format(desc.format),
                DXGI_SWAP_CHAIN_FLAG(0),
            )
        }
        .map_err(status)
    }

    fn create_heap(&self, device: DeviceHandle, desc: &NativeHeapDesc) -> NativeResult<HeapHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let heap_desc = D3D12_HEAP_DESC {
            SizeInBytes: desc.size,
            Properties: D3D12_HEAP_PROPERTIES {
                Type: convert::heap_type(desc.kind),
                ..Default::default()
            },
            Alignment: desc.alignment,
            Flags: convert::heap_flags(desc.category),
        };
        let mut heap: Option<ID3D12Heap> = None;
        unsafe { device.CreateHeap(&heap_desc, &mut heap) }.map_err(status)?;
        let heap = heap.ok_or(NativeStatus::E_FAIL)?;
        Ok(HeapHandle::from_raw(self.insert(D3d12Object::Heap(heap))))
    }

    fn create_placed_resource(
        &self,
        device: DeviceHandle,
        heap: HeapHandle,
        offset: u64,
        desc: &NativeResourceDesc,
        initial_state: ResourceState,
    ) -> NativeResult<ResourceHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let heap: ID3D12Heap = self.get(heap.raw())?;
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            device.CreatePlacedResource(
                &heap,
                offset,
                &convert::resource_desc(desc),
                convert::resource_state(initial_state),
                None,
                &mut resource,
            )
        }
        .map_err(status)?;
        let resource = resource.ok_or(NativeStatus::E_FAIL)?;
        Ok(ResourceHandle::from_raw(self.insert(D3d12Object::Resource(resource))))
    }

    fn map_resource(&self, resource: ResourceHandle, read_range: Option<Range<usize>>) -> NativeResult<*mut u8> {
        let resource: ID3D12Resource = self.get(resource.raw())?;
        let read_range = read_range.map(|range| D3D12_RANGE {
            Begin: range.start,
            End: range.end,
        });
        let mut data: *mut core::ffi::c_void = std::ptr::null_mut();
        unsafe { resource.Map(0, read_range.as_ref().map(|range| range as *const _), Some(&mut data)) }
            .map_err(status)?;
        if data.is_null() {
            return Err(NativeStatus::E_POINTER);
        }
        Ok(data as *mut u8)
    }

    fn unmap_resource(&self, resource: ResourceHandle, written_range: Option<Range<usize>>) {
        let Some(resource) = self.get_or_log::<ID3D12Resource>(resource.raw(), "Unmap") else {
            return;
        };
        let written_range = written_range.map(|range| D3D12_RANGE {
            Begin: range.start,
            End: range.end,
        });
        unsafe { resource.Unmap(0, written_range.as_ref().map(|range| range as *const _)) };
    }

    fn resource_gpu_address(&self, resource: ResourceHandle) -> u64 {
        self.get_or_log::<ID3D12Resource>(resource.raw(), "GetGPUVirtualAddress")
            .map(|resource| unsafe { resource.GetGPUVirtualAddress() })
            .unwrap_or(0)
    }

    fn create_descriptor_heap(
        &self,
        device: DeviceHandle,
        kind: NativeDescriptorHeapKind,
        count: u32,
        shader_visible: bool,
    ) -> NativeResult<DescriptorHeapHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let flags = if shader_visible {
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
        } else {
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE
        };
        let heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: convert::descriptor_heap_type(kind),
                NumDescriptors: count,
                Flags: flags,
                NodeMask: 0,
            })
        }
        .map_err(status)?;
        Ok(DescriptorHeapHandle::from_raw(self.insert(D3d12Object::DescriptorHeap(heap))))
    }

    fn descriptor_increment_size(&self, device: DeviceHandle, kind: NativeDescriptorHeapKind) -> u32 {
        self.get_or_log::<ID3D12Device>(device.raw(), "GetDescriptorHandleIncrementSize")
            .map(|device| unsafe { device.GetDescriptorHandleIncrementSize(convert::descriptor_heap_type(kind)) })
            .unwrap_or(0)
    }

    fn descriptor_heap_cpu_start(&self, heap: DescriptorHeapHandle) -> CpuDescriptor {
        self.get_or_log::<ID3D12DescriptorHeap>(heap.raw(), "GetCPUDescriptorHandleForHeapStart")
            .map(|heap| CpuDescriptor(unsafe { heap.GetCPUDescriptorHandleForHeapStart() }.ptr as u64))
            .unwrap_or(CpuDescriptor(0))
    }

    fn descriptor_heap_gpu_start(&self, heap: DescriptorHeapHandle) -> GpuDescriptor {
        self.get_or_log::<ID3D12DescriptorHeap>(heap.raw(), "GetGPUDescriptorHandleForHeapStart")
            .map(|heap| GpuDescriptor(unsafe { heap.GetGPUDescriptorHandleForHeapStart() }.ptr))
            .unwrap_or(GpuDescriptor(0))
    }

    fn create_render_target_view(&self, device: DeviceHandle, resource: ResourceHandle, dest: CpuDescriptor) {
        let (Some(device), Some(resource)) = (
            self.get_or_log::<ID3D12Device>(device.raw(), "CreateRenderTargetView"),
            self.get_or_log::<ID3D12Resource>(resource.raw(), "CreateRenderTargetView"),
        ) else {
            return;
        };
        let dest = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dest.0 as usize };
        unsafe { device.CreateRenderTargetView(&resource, None, dest) };
    }

    fn create_shader_resource_view(
        &self,
        device: DeviceHandle,
        resource: ResourceHandle,
        desc: &NativeShaderResourceViewDesc,
        dest: CpuDescriptor,
    ) {
        let (Some(device), Some(resource)) = (
            self.get_or_log::<ID3D12Device>(device.raw(), "CreateShaderResourceView"),
            self.get_or_log::<ID3D12Resource>(resource.raw(), "CreateShaderResourceView"),
        ) else {
            return;
        };
        let (view_dimension, anonymous) = match desc.dimension {
            NativeResourceDimension::Texture1D => (
                D3D12_SRV_DIMENSION_TEXTURE1D,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture1D: D3D12_TEX1D_SRV {
                        MipLevels: desc.mip_levels,
                        ..Default::default()
                    },
                },
            ),
            NativeResourceDimension::Texture2D => (
                D3D12_SRV_DIMENSION_TEXTURE2D,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture2D: D3D12_TEX2D_SRV {
                        MipLevels: desc.mip_levels,
                        ..Default::default()
                    },
                },
            ),
            NativeResourceDimension::Texture3D => (
                D3D12_SRV_DIMENSION_TEXTURE3D,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture3D: D3D12_TEX3D_SRV {
                        MipLevels: desc.mip_levels,
                        ..Default::default()
                    },
                },
            ),
            NativeResourceDimension::Buffer => {
                log::error!("CreateShaderResourceView: buffer views are not supported");
                return;
            }
        };
        let srv_desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: convert::format(desc.format),
            ViewDimension: view_dimension,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: anonymous,
        };
        let dest = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dest.0 as usize };
        unsafe { device.CreateShaderResourceView(&resource, Some(&srv_desc), dest) };
    }

    fn create_root_signature(
        &self,
        device: DeviceHandle,
        desc: &NativeRootSignatureDesc,
    ) -> NativeResult<RootSignatureHandle> {
        let device: ID3D12Device = self.get(device.raw())?;

        // parameters 中的指针指向 ranges，ranges 在 serialize 之前不能重新分配
        let ranges = desc
            .parameters
            .iter()
            .map(|parameter| match parameter {
                NativeRootParameter::SrvDescriptorTable {
                    base_register, count, ..
                } => D3D12_DESCRIPTOR_RANGE {
                    RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
                    NumDescriptors: *count,
                    BaseShaderRegister: *base_register,
                    RegisterSpace: 0,
                    OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
                },
                NativeRootParameter::ConstantBufferView { .. } => D3D12_DESCRIPTOR_RANGE::default(),
            })
            .collect::<Vec<_>>();
        let parameters = desc
            .parameters
            .iter()
            .zip(&ranges)
            .map(|(parameter, range)| match parameter {
                NativeRootParameter::ConstantBufferView { register, visibility } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        Descriptor: D3D12_ROOT_DESCRIPTOR {
                            ShaderRegister: *register,
                            RegisterSpace: 0,
                        },
                    },
                    ShaderVisibility: convert::shader_visibility(*visibility),
                },
                NativeRootParameter::SrvDescriptorTable { visibility, .. } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                            NumDescriptorRanges: 1,
                            pDescriptorRanges: range,
                        },
                    },
                    ShaderVisibility: convert::shader_visibility(*visibility),
                },
            })
            .collect::<Vec<_>>();
        let samplers = desc
            .static_samplers
            .iter()
            .map(|sampler| D3D12_STATIC_SAMPLER_DESC {
                Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
                AddressU: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
                AddressV: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
                AddressW: D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
                MaxLOD: D3D12_FLOAT32_MAX,
                ShaderRegister: sampler.register,
                RegisterSpace: 0,
                ShaderVisibility: convert::shader_visibility(sampler.visibility),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        let flags = if desc.allow_input_layout {
            D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT
        } else {
            D3D12_ROOT_SIGNATURE_FLAG_NONE
        };
        let root_desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: samplers.len() as u32,
            pStaticSamplers: samplers.as_ptr(),
            Flags: flags,
        };
        let blob = Self::serialize_root_signature(&root_desc)?;
        let root_signature: ID3D12RootSignature = unsafe {
            device.CreateRootSignature(
                0,
                std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()),
            )
        }
        .map_err(status)?;
        Ok(RootSignatureHandle::from_raw(self.insert(D3d12Object::RootSignature(root_signature))))
    }

    fn create_graphics_pipeline_state(
        &self,
        device: DeviceHandle,
        desc: &NativeGraphicsPipelineDesc<'_>,
    ) -> NativeResult<PipelineStateHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let root_signature: ID3D12RootSignature = self.get(desc.root_signature.raw())?;

        // PCSTR 需要以 NUL 结尾
        let semantic_names = desc
            .input_layout
            .iter()
            .map(|element| CString::new(element.semantic_name).map_err(|_| NativeStatus::E_INVALIDARG))
            .collect::<NativeResult<Vec<_>>>()?;
        let input_elements = desc
            .input_layout
            .iter()
            .zip(&semantic_names)
            .map(|(element, name)| D3D12_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(name.as_ptr() as *const u8),
                SemanticIndex: element.semantic_index,
                Format: convert::format(element.format),
                InputSlot: element.input_slot,
                AlignedByteOffset: element.aligned_byte_offset,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
            .collect::<Vec<_>>();

        let bytecode = |code: Option<&[u8]>| match code {
            Some(code) => D3D12_SHADER_BYTECODE {
                pShaderBytecode: code.as_ptr() as *const core::ffi::c_void,
                BytecodeLength: code.len(),
            },
            None => D3D12_SHADER_BYTECODE::default(),
        };

        let mut render_target_formats = [Default::default(); 8];
        render_target_formats[0] = convert::format(desc.render_target_format);
        let mut blend_targets = [D3D12_RENDER_TARGET_BLEND_DESC::default(); 8];
        blend_targets[0].RenderTargetWriteMask = D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8;

        let pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: ManuallyDrop::new(Some(root_signature)),
            VS: bytecode(desc.vertex_shader),
            PS: bytecode(desc.pixel_shader),
            BlendState: D3D12_BLEND_DESC {
                RenderTarget: blend_targets,
                ..Default::default()
            },
            SampleMask: u32::MAX,
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE_NONE,
                DepthClipEnable: true.into(),
                ..Default::default()
            },
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_elements.as_ptr(),
                NumElements: input_elements.len() as u32,
            },
            PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
            NumRenderTargets: 1,
            RTVFormats: render_target_formats,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            ..Default::default()
        };
        let pipeline = unsafe { device.CreateGraphicsPipelineState::<ID3D12PipelineState>(&pso_desc) };
        drop(ManuallyDrop::into_inner(pso_desc.pRootSignature));
        let pipeline = pipeline.map_err(status)?;
        Ok(PipelineStateHandle::from_raw(self.insert(D3d12Object::PipelineState(pipeline))))
    }

    fn create_fence(&self, device: DeviceHandle, initial_value: u64) -> NativeResult<FenceHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let fence: ID3D12Fence = unsafe { device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE) }.map_err(status)?;
        Ok(FenceHandle::from_raw(self.insert(D3d12Object::Fence(fence))))
    }

    fn fence_completed_value(&self, fence: FenceHandle) -> u64 {
        self.get_or_log::<ID3D12Fence>(fence.raw(), "GetCompletedValue")
            .map(|fence| unsafe { fence.GetCompletedValue() })
            // 与 device removed 时的返回值一致
            .unwrap_or(u64::MAX)
    }

    fn fence_set_event_on_completion(&self, fence: FenceHandle, value: u64, event: EventHandle) -> NativeResult<()> {
        let fence: ID3D12Fence = self.get(fence.raw())?;
        let event: HANDLE = self.get(event.raw())?;
        unsafe { fence.SetEventOnCompletion(value, event) }.map_err(status)
    }

    fn queue_signal(&self, queue: QueueHandle, fence: FenceHandle, value: u64) -> NativeResult<()> {
        let queue: ID3D12CommandQueue = self.get(queue.raw())?;
        let fence: ID3D12Fence = self.get(fence.raw())?;
        unsafe { queue.Signal(&fence, value) }.map_err(status)
    }

    fn create_event(&self) -> NativeResult<EventHandle> {
        let event = unsafe { CreateEventW(None, false, false, None) }.map_err(status)?;
        Ok(EventHandle::from_raw(self.insert(D3d12Object::Event(OwnedEvent(event)))))
    }

    fn wait_for_event(&self, event: EventHandle, timeout_ms: u32) -> NativeResult<NativeWaitStatus> {
        let event: HANDLE = self.get(event.raw())?;
        // INFINITE_WAIT_MS 与 INFINITE 的数值相同
        match unsafe { WaitForSingleObject(event, timeout_ms) } {
            WAIT_OBJECT_0 => Ok(NativeWaitStatus::Signaled),
            WAIT_TIMEOUT => Ok(NativeWaitStatus::Timeout),
            other => {
                log::error!("WaitForSingleObject returned {:#x}", other.0);
                Err(NativeStatus::WAIT_FAILED)
            }
        }
    }

    fn create_command_allocator(&self, device: DeviceHandle) -> NativeResult<CommandAllocatorHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }.map_err(status)?;
        Ok(CommandAllocatorHandle::from_raw(self.insert(D3d12Object::CommandAllocator(allocator))))
    }

    fn reset_command_allocator(&self, allocator: CommandAllocatorHandle) -> NativeResult<()> {
        let allocator: ID3D12CommandAllocator = self.get(allocator.raw())?;
        unsafe { allocator.Reset() }.map_err(status)
    }

    fn create_command_list(
        &self,
        device: DeviceHandle,
        allocator: CommandAllocatorHandle,
    ) -> NativeResult<CommandListHandle> {
        let device: ID3D12Device = self.get(device.raw())?;
        let allocator: ID3D12CommandAllocator = self.get(allocator.raw())?;
        let list: ID3D12GraphicsCommandList =
            unsafe { device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None) }
                .map_err(status)?;
        // 新建的 command list 处于 recording 状态
        unsafe { list.Close() }.map_err(status)?;
        Ok(CommandListHandle::from_raw(self.insert(D3d12Object::CommandList(list))))
    }

    fn reset_command_list(
        &self,
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
        initial_pipeline: Option<PipelineStateHandle>,
    ) -> NativeResult<()> {
        let raw = list.raw();
        let list: ID3D12GraphicsCommandList = self.get(raw)?;
        let allocator: ID3D12CommandAllocator = self.get(allocator.raw())?;
        self.poisoned_lists.borrow_mut().remove(&raw);
        match initial_pipeline {
            Some(pipeline) => {
                let pipeline: ID3D12PipelineState = self.get(pipeline.raw())?;
                unsafe { list.Reset(&allocator, &pipeline) }.map_err(status)
            }
            None => unsafe { list.Reset(&allocator, None) }.map_err(status),
        }
    }

    fn close_command_list(&self, list: CommandListHandle) -> NativeResult<()> {
        let poisoned = self.poisoned_lists.borrow_mut().remove(&list.raw());
        let list: ID3D12GraphicsCommandList = self.get(list.raw())?;
        unsafe { list.Close() }.map_err(status)?;
        if poisoned {
            return Err(NativeStatus::E_FAIL);
        }
        Ok(())
    }

    fn record_command(&self, list: CommandListHandle, command: NativeCommand) {
        let Some(native_list) = self.get_or_log::<ID3D12GraphicsCommandList>(list.raw(), command.name()) else {
            return;
        };
        if let Err(err) = self.record(&native_list, &command) {
            log::error!("{}: {}", command.name(), err);
            self.poisoned_lists.borrow_mut().insert(list.raw());
        }
    }

    fn execute_command_lists(&self, queue: QueueHandle, lists: &[CommandListHandle]) {
        let Some(queue) = self.get_or_log::<ID3D12CommandQueue>(queue.raw(), "ExecuteCommandLists") else {
            return;
        };
        let lists = lists
            .iter()
            .filter_map(|list| self.get_or_log::<ID3D12GraphicsCommandList>(list.raw(), "ExecuteCommandLists"))
            .map(|list| Some(list.into()))
            .collect::<Vec<Option<ID3D12CommandList>>>();
        unsafe { queue.ExecuteCommandLists(&lists) };
    }
}
