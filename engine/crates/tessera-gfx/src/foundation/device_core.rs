use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::config::GfxConfig;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::memory::memory_allocator::GfxMemoryAllocator;
use crate::memory::memory_block::GfxMemoryRegion;
use crate::memory::{GfxHeapCategory, GfxHeapKind};
use crate::native::{
    AdapterHandle, CpuDescriptor, DescriptorHeapHandle, DeviceHandle, FactoryHandle, GfxExtent2D, NativeDescriptorHeapKind,
    NativeDriver, NativeRef, NativeResourceDesc, QueueHandle,
};
use crate::swapchain::render_swapchain::GfxRenderSwapchain;
use crate::swapchain::surface::GfxSurface;

/// 一个 device 下所有对象共享的原生对象
///
/// device、queue、RTV heap、swapchain 都在第一次访问时创建；
/// context、fence、资源等对象通过 `Rc<GfxDeviceCore>` 访问它们
pub struct GfxDeviceCore {
    driver: Rc<dyn NativeDriver>,
    factory: RefCell<Option<NativeRef<FactoryHandle>>>,
    adapter: RefCell<Option<NativeRef<AdapterHandle>>>,

    config: GfxConfig,
    surface: Cell<GfxSurface>,

    device: LazyNative<DeviceHandle>,
    queue: LazyNative<QueueHandle>,
    rtv_heap: LazyNative<DescriptorHeapHandle>,
    swapchain: RefCell<Option<Rc<GfxRenderSwapchain>>>,
    memory: GfxMemoryAllocator,

    lifecycle: GfxLifecycle,
}

// new & init
impl GfxDeviceCore {
    pub fn new(
        factory: NativeRef<FactoryHandle>,
        adapter: NativeRef<AdapterHandle>,
        surface: GfxSurface,
        config: GfxConfig,
    ) -> Rc<Self> {
        Rc::new(Self {
            driver: adapter.driver().clone(),
            factory: RefCell::new(Some(factory)),
            adapter: RefCell::new(Some(adapter)),
            memory: GfxMemoryAllocator::new(config.memory.block_size),
            config,
            surface: Cell::new(surface),
            device: LazyNative::new(),
            queue: LazyNative::new(),
            rtv_heap: LazyNative::new(),
            swapchain: RefCell::new(None),
            lifecycle: GfxLifecycle::new("GfxDevice"),
        })
    }
}

// getters
impl GfxDeviceCore {
    #[inline]
    pub fn driver(&self) -> &Rc<dyn NativeDriver> {
        &self.driver
    }

    #[inline]
    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    #[inline]
    pub fn surface(&self) -> GfxSurface {
        self.surface.get()
    }

    #[inline]
    pub fn surface_extent(&self) -> GfxExtent2D {
        self.surface.get().extent()
    }

    #[inline]
    pub fn memory(&self) -> &GfxMemoryAllocator {
        &self.memory
    }

    #[inline]
    pub fn ensure_alive(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    fn native_adapter(&self) -> GfxResult<AdapterHandle> {
        self.adapter.borrow().as_ref().map(NativeRef::handle).ok_or(GfxError::Disposed { object: "GfxDevice" })
    }

    fn native_factory(&self) -> GfxResult<FactoryHandle> {
        self.factory.borrow().as_ref().map(NativeRef::handle).ok_or(GfxError::Disposed { object: "GfxDevice" })
    }

    pub fn device(&self) -> GfxResult<DeviceHandle> {
        self.ensure_alive()?;
        self.device.get_or_try_create(|| {
            let device = self.driver.create_device(self.native_adapter()?).or_external("D3D12CreateDevice")?;
            log::info!("create device on {} driver: {:?}", self.driver.backend_name(), device);
            Ok(NativeRef::attach(&self.driver, device))
        })
    }

    pub fn queue(&self) -> GfxResult<QueueHandle> {
        let device = self.device()?;
        self.queue.get_or_try_create(|| {
            let queue = self.driver.create_command_queue(device).or_external("CreateCommandQueue")?;
            log::info!("create direct command queue: {:?}", queue);
            Ok(NativeRef::attach(&self.driver, queue))
        })
    }

    /// 每个 back buffer 一个 RTV
    pub fn rtv_heap(&self) -> GfxResult<DescriptorHeapHandle> {
        let device = self.device()?;
        self.rtv_heap.get_or_try_create(|| {
            let count = self.config.device.back_buffer_count;
            let heap = self
                .driver
                .create_descriptor_heap(device, NativeDescriptorHeapKind::Rtv, count, false)
                .or_external("CreateDescriptorHeap")?;
            Ok(NativeRef::attach(&self.driver, heap))
        })
    }

    pub fn rtv_descriptor(&self, index: u32) -> GfxResult<CpuDescriptor> {
        if index >= self.config.device.back_buffer_count {
            return Err(GfxError::invalid_argument("index", format!("no RTV slot for back buffer {index}")));
        }
        let heap = self.rtv_heap()?;
        let increment = self.driver.descriptor_increment_size(self.device()?, NativeDescriptorHeapKind::Rtv);
        Ok(self.driver.descriptor_heap_cpu_start(heap).offset(index, increment))
    }

    pub fn swapchain(&self) -> GfxResult<Rc<GfxRenderSwapchain>> {
        self.ensure_alive()?;
        if let Some(swapchain) = self.swapchain.borrow().as_ref() {
            return Ok(swapchain.clone());
        }

        let queue = self.queue()?;
        let swapchain = Rc::new(GfxRenderSwapchain::new(
            &self.driver,
            self.native_factory()?,
            queue,
            &self.surface.get(),
            self.config.device.back_buffer_count,
            self.config.device.back_buffer_format,
        )?);
        *self.swapchain.borrow_mut() = Some(swapchain.clone());
        Ok(swapchain)
    }
}

// tools
impl GfxDeviceCore {
    /// 根据原生的 allocation info 为资源分配一段 heap 区域
    pub fn allocate_memory(
        &self,
        kind: GfxHeapKind,
        category: GfxHeapCategory,
        desc: &NativeResourceDesc,
    ) -> GfxResult<GfxMemoryRegion> {
        let device = self.device()?;
        let info = self.driver.resource_allocation_info(device, desc).or_external("GetResourceAllocationInfo")?;
        self.memory.allocate(&self.driver, device, kind, category, info)
    }

    pub(crate) fn set_surface_extent(&self, extent: GfxExtent2D) {
        let mut surface = self.surface.get();
        surface.set_extent(extent);
        self.surface.set(surface);
    }
}

// destroy
impl GfxDeviceCore {
    /// 按 swapchain → RTV heap → memory block → queue → device → adapter → factory 的顺序释放
    ///
    /// 调用方需要先等待 GPU 空闲并销毁所有 context
    pub(crate) fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let swapchain = self.swapchain.borrow_mut().take();
        if swapchain.as_ref().is_some_and(|swapchain| Rc::strong_count(swapchain) > 1) {
            log::warn!("swapchain is still referenced while the device is disposed");
        }
        drop(swapchain);
        self.rtv_heap.release();
        self.memory.release_blocks();
        self.queue.release();
        self.device.release();
        let adapter = self.adapter.borrow_mut().take();
        drop(adapter);
        let factory = self.factory.borrow_mut().take();
        drop(factory);
        self.lifecycle.end_dispose();
    }
}
