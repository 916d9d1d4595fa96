use std::cell::Cell;
use std::rc::Rc;

use crate::basic::lifecycle::GfxLifecycle;
use crate::commands::context::GfxContext;
use crate::commands::fence::GfxFence;
use crate::config::GfxConfig;
use crate::error::{GfxError, GfxResult};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::{AdapterHandle, FactoryHandle, GfxExtent2D, GfxFormat, NativeRef};
use crate::pipelines::pipeline::GfxPipeline;
use crate::pipelines::pipeline_signature::{GfxInputElement, GfxPipelineResource, GfxPipelineSignature};
use crate::pipelines::primitive::GfxPrimitive;
use crate::pipelines::shader::{GfxShader, GfxShaderKind};
use crate::resources::buffer::GfxBuffer;
use crate::resources::resource_state::{GfxBufferKind, GfxCpuAccess, GfxTextureKind};
use crate::resources::texture::GfxTexture;
use crate::resources::views::{GfxBufferView, GfxResourceBinding};
use crate::swapchain::render_swapchain::GfxRenderSwapchain;
use crate::swapchain::surface::GfxSurface;

/// 一个逻辑 device：共享的原生对象 + 每个 back buffer 一个 context
///
/// swapchain 在构造时立即创建，用来确定当前 context 的 index；
/// 其余原生对象都在第一次使用时创建
///
/// `current_context_index()` 始终等于 swapchain 当前的 back buffer index，
/// 在构造、`present_frame` 和 `on_surface_resized` 之后重新同步
///
/// # Destroy
/// drop 时自动 dispose，也可以提前手动 dispose
pub struct GfxDevice {
    core: Rc<GfxDeviceCore>,

    contexts: Vec<GfxContext>,
    current_index: Cell<u32>,
    idle_fence: GfxFence,

    lifecycle: GfxLifecycle,
}

// new & init
impl GfxDevice {
    pub fn new(
        factory: NativeRef<FactoryHandle>,
        adapter: NativeRef<AdapterHandle>,
        surface: GfxSurface,
        config: GfxConfig,
    ) -> GfxResult<Self> {
        config.validate()?;
        let core = GfxDeviceCore::new(factory, adapter, surface, config);

        let swapchain = match core.swapchain() {
            Ok(swapchain) => swapchain,
            Err(err) => {
                core.dispose();
                return Err(err);
            }
        };
        let contexts = (0..swapchain.buffer_count()).map(|index| GfxContext::new(&core, index)).collect();
        let current_index = swapchain.current_back_buffer_index();
        log::info!(
            "create device: {} back buffers {:?}, {}x{}",
            swapchain.buffer_count(),
            swapchain.format(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            idle_fence: GfxFence::new(&core, "device-idle"),
            core,
            contexts,
            current_index: Cell::new(current_index),
            lifecycle: GfxLifecycle::new("GfxDevice"),
        })
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn core(&self) -> &Rc<GfxDeviceCore> {
        &self.core
    }

    #[inline]
    pub fn config(&self) -> &GfxConfig {
        self.core.config()
    }

    #[inline]
    pub fn surface_extent(&self) -> GfxExtent2D {
        self.core.surface_extent()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    #[inline]
    pub fn contexts(&self) -> &[GfxContext] {
        &self.contexts
    }

    #[inline]
    pub fn current_context_index(&self) -> u32 {
        self.current_index.get()
    }

    pub fn current_context(&self) -> GfxResult<&GfxContext> {
        self.lifecycle.ensure_alive()?;
        let index = self.current_index.get();
        self.contexts.get(index as usize).ok_or(GfxError::InvalidState {
            object: "GfxDevice",
            expected: "back buffer index within context count",
            actual: "back buffer index out of range",
        })
    }

    pub fn swapchain(&self) -> GfxResult<Rc<GfxRenderSwapchain>> {
        self.lifecycle.ensure_alive()?;
        self.core.swapchain()
    }
}

// update
impl GfxDevice {
    /// present 当前 back buffer，并让刚使用过的 context 的 frame fence 在 GPU 完成后 signal
    pub fn present_frame(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        let swapchain = self.core.swapchain()?;
        swapchain.present(self.core.config().device.sync_interval)?;

        let context = self.current_context()?;
        context.frame_fence().signal(self.core.queue()?)?;

        self.sync_context_index(&swapchain);
        Ok(())
    }

    /// 阻塞直到 queue 上已经提交的工作全部完成
    pub fn wait_for_idle(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        self.wait_for_idle_unchecked()
    }

    /// 尺寸为 0（例如窗口最小化）时忽略
    pub fn on_surface_resized(&self, extent: GfxExtent2D) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        if extent.is_empty() {
            log::warn!("ignore surface resize to {}x{}", extent.width, extent.height);
            return Ok(());
        }

        self.wait_for_idle_unchecked()?;
        // resize 之前必须释放所有 back buffer 的引用
        self.contexts.iter().for_each(GfxContext::on_surface_resized);

        let swapchain = self.core.swapchain()?;
        swapchain.resize(extent)?;
        self.core.set_surface_extent(extent);
        self.sync_context_index(&swapchain);
        Ok(())
    }

    /// 先推进目标值再 signal，保证等待的是这一次 signal
    fn wait_for_idle_unchecked(&self) -> GfxResult<()> {
        let queue = self.core.queue()?;
        self.idle_fence.reset()?;
        self.idle_fence.signal(queue)?;
        self.idle_fence.wait()
    }

    fn sync_context_index(&self, swapchain: &GfxRenderSwapchain) {
        let index = swapchain.current_back_buffer_index();
        log::trace!("current context: {} -> {}", self.current_index.get(), index);
        self.current_index.set(index);
    }
}

// factories
impl GfxDevice {
    pub fn create_buffer(
        &self,
        kind: GfxBufferKind,
        cpu_access: GfxCpuAccess,
        size: u64,
        stride: u32,
        name: impl Into<String>,
    ) -> GfxResult<GfxBuffer> {
        self.lifecycle.ensure_alive()?;
        GfxBuffer::new(&self.core, kind, cpu_access, size, stride, name)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_texture(
        &self,
        kind: GfxTextureKind,
        cpu_access: GfxCpuAccess,
        width: u32,
        height: u32,
        depth: u16,
        format: GfxFormat,
        name: impl Into<String>,
    ) -> GfxResult<GfxTexture> {
        self.lifecycle.ensure_alive()?;
        GfxTexture::new(&self.core, kind, cpu_access, width, height, depth, format, name)
    }

    pub fn create_shader(
        &self,
        kind: GfxShaderKind,
        bytecode: Vec<u8>,
        entry_point: impl Into<String>,
    ) -> GfxResult<GfxShader> {
        self.lifecycle.ensure_alive()?;
        GfxShader::new(kind, bytecode, entry_point)
    }

    pub fn create_pipeline_signature(
        &self,
        inputs: Vec<GfxInputElement>,
        resources: Vec<GfxPipelineResource>,
        name: impl Into<String>,
    ) -> GfxResult<GfxPipelineSignature> {
        self.lifecycle.ensure_alive()?;
        GfxPipelineSignature::new(&self.core, inputs, resources, name)
    }

    pub fn create_pipeline(
        &self,
        signature: Rc<GfxPipelineSignature>,
        vertex_shader: GfxShader,
        pixel_shader: Option<GfxShader>,
        name: impl Into<String>,
    ) -> GfxResult<GfxPipeline> {
        self.lifecycle.ensure_alive()?;
        GfxPipeline::new(signature, vertex_shader, pixel_shader, name)
    }

    pub fn create_primitive(
        &self,
        pipeline: Rc<GfxPipeline>,
        vertices: GfxBufferView,
        indices: Option<GfxBufferView>,
        bindings: Vec<GfxResourceBinding>,
        name: impl Into<String>,
    ) -> GfxResult<GfxPrimitive> {
        self.lifecycle.ensure_alive()?;
        GfxPrimitive::new(pipeline, vertices, indices, bindings, name)
    }
}

// destroy
impl GfxDevice {
    /// 尽力而为：等待 GPU 空闲失败时只记录日志，之后的释放照常进行
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        if let Err(err) = self.wait_for_idle_unchecked() {
            log::error!("wait for idle failed while disposing device: {}", err);
        }
        self.contexts.iter().for_each(GfxContext::dispose);
        self.idle_fence.dispose();
        self.core.dispose();
        log::info!("device disposed");
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::null::NullDriver;
    use crate::native::{NativeDriver, NativeStatus};

    fn refs(null: &Rc<NullDriver>) -> (NativeRef<FactoryHandle>, NativeRef<AdapterHandle>) {
        let driver: Rc<dyn NativeDriver> = null.clone();
        let factory = NativeRef::attach(&driver, driver.create_factory(false).unwrap());
        let adapter = NativeRef::attach(&driver, driver.enum_adapter(factory.handle(), 0).unwrap());
        (factory, adapter)
    }

    fn device(null: &Rc<NullDriver>) -> GfxDevice {
        let (factory, adapter) = refs(null);
        GfxDevice::new(factory, adapter, GfxSurface::headless(GfxExtent2D::new(32, 32)), GfxConfig::default()).unwrap()
    }

    #[test]
    fn test_swapchain_is_eager() {
        let null = Rc::new(NullDriver::new());
        let device = device(&null);
        assert_eq!(null.call_count("CreateSwapChainForHwnd"), 1);
        assert_eq!(device.contexts().len(), 2);
        assert_eq!(device.current_context_index(), 0);
        // 其余对象仍然是延迟创建的
        assert_eq!(null.call_count("CreateCommandAllocator"), 0);
        assert_eq!(null.call_count("CreateDescriptorHeap"), 0);
    }

    #[test]
    fn test_zero_sized_resize_is_ignored() {
        let null = Rc::new(NullDriver::new());
        let device = device(&null);

        device.on_surface_resized(GfxExtent2D::new(0, 480)).unwrap();
        assert_eq!(null.call_count("ResizeBuffers"), 0);
        assert_eq!(device.surface_extent(), GfxExtent2D::new(32, 32));
    }

    #[test]
    fn test_swapchain_failure_releases_core() {
        let null = Rc::new(NullDriver::new());
        let (factory, adapter) = refs(&null);
        null.fail_next_call("CreateSwapChainForHwnd", NativeStatus::E_OUTOFMEMORY);

        let result = GfxDevice::new(factory, adapter, GfxSurface::headless(GfxExtent2D::new(8, 8)), GfxConfig::default());
        assert!(matches!(result, Err(GfxError::ExternalCall { operation: "CreateSwapChainForHwnd", .. })));
        assert_eq!(null.live_object_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let null = Rc::new(NullDriver::new());
        let (factory, adapter) = refs(&null);
        let mut config = GfxConfig::default();
        config.device.back_buffer_count = 1;

        let result = GfxDevice::new(factory, adapter, GfxSurface::headless(GfxExtent2D::new(8, 8)), config);
        assert!(matches!(result, Err(GfxError::InvalidArgument { .. })));
        assert_eq!(null.call_count("D3D12CreateDevice"), 0);
    }

    #[test]
    fn test_disposed_device_rejects_work() {
        let null = Rc::new(NullDriver::new());
        let device = device(&null);
        device.dispose();

        assert!(matches!(device.present_frame(), Err(GfxError::Disposed { object: "GfxDevice" })));
        assert!(matches!(device.wait_for_idle(), Err(GfxError::Disposed { .. })));
        assert!(device.create_buffer(GfxBufferKind::Default, GfxCpuAccess::None, 16, 0, "late").is_err());
        device.dispose();
    }
}
