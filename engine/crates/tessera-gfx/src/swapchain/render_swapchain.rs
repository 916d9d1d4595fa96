use std::cell::Cell;
use std::rc::Rc;

use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::native::{
    FactoryHandle, GfxExtent2D, GfxFormat, NativeDriver, NativeRef, NativeSwapChainDesc, QueueHandle, ResourceHandle,
    SwapChainHandle,
};
use crate::swapchain::surface::GfxSurface;

/// 对原生 swap chain 的封装
///
/// back buffer 的 index 由原生 swap chain 决定，这里只负责查询
pub struct GfxRenderSwapchain {
    swapchain: NativeRef<SwapChainHandle>,

    buffer_count: u32,
    format: GfxFormat,
    extent: Cell<GfxExtent2D>,
}

// new & init
impl GfxRenderSwapchain {
    pub fn new(
        driver: &Rc<dyn NativeDriver>,
        factory: FactoryHandle,
        queue: QueueHandle,
        surface: &GfxSurface,
        buffer_count: u32,
        format: GfxFormat,
    ) -> GfxResult<Self> {
        if surface.extent().is_empty() {
            return Err(GfxError::invalid_argument("surface", "extent must not be empty"));
        }

        let desc = NativeSwapChainDesc {
            extent: surface.extent(),
            format,
            buffer_count,
        };
        let handle =
            driver.create_swap_chain(factory, queue, surface.window(), &desc).or_external("CreateSwapChainForHwnd")?;
        log::info!(
            "create swapchain: {}x{}, {} buffers, {:?}, headless: {}",
            desc.extent.width,
            desc.extent.height,
            buffer_count,
            format,
            surface.is_headless()
        );

        Ok(Self {
            swapchain: NativeRef::attach(driver, handle),
            buffer_count,
            format,
            extent: Cell::new(desc.extent),
        })
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn handle(&self) -> SwapChainHandle {
        self.swapchain.handle()
    }

    #[inline]
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    #[inline]
    pub fn format(&self) -> GfxFormat {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> GfxExtent2D {
        self.extent.get()
    }

    /// 实时查询原生 swap chain 当前的 back buffer
    #[inline]
    pub fn current_back_buffer_index(&self) -> u32 {
        self.swapchain.driver().swap_chain_current_back_buffer_index(self.handle())
    }

    /// 返回的引用必须在 [`Self::resize`] 之前释放
    pub fn buffer(&self, index: u32) -> GfxResult<NativeRef<ResourceHandle>> {
        if index >= self.buffer_count {
            return Err(GfxError::invalid_argument(
                "index",
                format!("back buffer {index} out of range, swapchain has {} buffers", self.buffer_count),
            ));
        }
        let driver = self.swapchain.driver();
        let buffer = driver.swap_chain_buffer(self.handle(), index).or_external("GetBuffer")?;
        Ok(NativeRef::attach(driver, buffer))
    }
}

// update
impl GfxRenderSwapchain {
    pub fn present(&self, sync_interval: u32) -> GfxResult<()> {
        self.swapchain.driver().swap_chain_present(self.handle(), sync_interval).or_external("Present")
    }

    /// 保持 buffer 数量和格式不变，只修改尺寸
    pub fn resize(&self, extent: GfxExtent2D) -> GfxResult<()> {
        if extent.is_empty() {
            return Err(GfxError::invalid_argument("extent", "swapchain extent must not be empty"));
        }
        let desc = NativeSwapChainDesc {
            extent,
            format: self.format,
            buffer_count: self.buffer_count,
        };
        self.swapchain.driver().swap_chain_resize_buffers(self.handle(), &desc).or_external("ResizeBuffers")?;
        log::info!("resize swapchain: {}x{}", extent.width, extent.height);
        self.extent.set(extent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::null::NullDriver;
    use crate::native::NativeStatus;

    fn swapchain(buffer_count: u32) -> (Rc<NullDriver>, GfxRenderSwapchain) {
        let null = Rc::new(NullDriver::new());
        let driver: Rc<dyn NativeDriver> = null.clone();
        let factory = driver.create_factory(false).unwrap();
        let adapter = driver.enum_adapter(factory, 0).unwrap();
        let device = driver.create_device(adapter).unwrap();
        let queue = driver.create_command_queue(device).unwrap();
        let surface = GfxSurface::headless(GfxExtent2D::new(320, 240));
        let swapchain =
            GfxRenderSwapchain::new(&driver, factory, queue, &surface, buffer_count, GfxFormat::B8G8R8A8Unorm).unwrap();
        (null, swapchain)
    }

    #[test]
    fn test_present_advances_back_buffer() {
        let (_null, swapchain) = swapchain(3);
        assert_eq!(swapchain.current_back_buffer_index(), 0);
        swapchain.present(1).unwrap();
        assert_eq!(swapchain.current_back_buffer_index(), 1);
    }

    #[test]
    fn test_buffer_index_out_of_range() {
        let (null, swapchain) = swapchain(2);
        assert!(matches!(swapchain.buffer(2), Err(GfxError::InvalidArgument { name: "index", .. })));
        assert_eq!(null.call_count("GetBuffer"), 0);
    }

    #[test]
    fn test_resize_with_outstanding_buffer_fails() {
        let (_null, swapchain) = swapchain(2);
        let buffer = swapchain.buffer(0).unwrap();

        let err = swapchain.resize(GfxExtent2D::new(64, 64)).unwrap_err();
        assert_eq!(err.native_status(), Some(NativeStatus::DXGI_ERROR_INVALID_CALL));
        assert_eq!(swapchain.extent(), GfxExtent2D::new(320, 240));

        drop(buffer);
        swapchain.resize(GfxExtent2D::new(64, 64)).unwrap();
        assert_eq!(swapchain.extent(), GfxExtent2D::new(64, 64));
    }
}
