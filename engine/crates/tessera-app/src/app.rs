use std::rc::Rc;

use anyhow::Context;
use itertools::Itertools;
use tessera_crate_tools::init_log::init_log;
use tessera_crate_tools::resource::TesseraPath;
use tessera_gfx::basic::color::GfxColor;
use tessera_gfx::config::GfxConfig;
use tessera_gfx::foundation::device::GfxDevice;
use tessera_gfx::foundation::provider::GfxProvider;
use tessera_gfx::native::null::NullDriver;
use tessera_gfx::native::{GfxExtent2D, NativeDriver};
use tessera_gfx::swapchain::surface::GfxSurface;

use crate::outer_app::OuterApp;

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

/// 帧循环的参数
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub frame_count: u32,
    pub initial_extent: GfxExtent2D,
    /// 在第几帧之后调整一次 surface 尺寸
    pub resize_at: Option<(u32, GfxExtent2D)>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            frame_count: 120,
            initial_extent: GfxExtent2D::new(1200, 800),
            resize_at: Some((60, GfxExtent2D::new(1600, 900))),
        }
    }
}

/// headless 示例程序：null driver 上的完整帧循环
///
/// # Destroy
/// 需要手动调用 [`RenderApp::destroy`]，返回仍然存活的原生对象
pub struct RenderApp {
    settings: RunSettings,
    clear_color: GfxColor,

    outer_app: Option<Box<dyn OuterApp>>,
    device: Option<GfxDevice>,
    provider: Option<GfxProvider>,
    null: Rc<NullDriver>,
}
// new & init
impl RenderApp {
    pub fn init_env() {
        std::panic::set_hook(Box::new(panic_handler));

        init_log();

        tracy_client::Client::start();
        tracy_client::set_thread_name!("RenderThread");
    }

    /// 读取 `config/tessera.toml`，文件不存在时使用默认配置
    pub fn load_config() -> anyhow::Result<GfxConfig> {
        let path = TesseraPath::config_path("tessera.toml");
        if !path.exists() {
            log::warn!("config file not found: {}, use default config", path.display());
            return Ok(GfxConfig::default());
        }
        let config = GfxConfig::from_file(&path)?;
        log::info!("load config: {}", path.display());
        Ok(config)
    }

    pub fn new(config: GfxConfig, settings: RunSettings, mut outer_app: Box<dyn OuterApp>) -> anyhow::Result<Self> {
        let null = Rc::new(NullDriver::new());
        let driver: Rc<dyn NativeDriver> = null.clone();
        let provider = GfxProvider::new(driver, config.clone()).context("创建 provider 失败")?;

        let adapter = provider
            .adapters()
            .context("枚举 adapter 失败")?
            .into_iter()
            .next()
            .context("没有可用的 adapter")?;
        log::info!(
            "use adapter {}: {} (vendor {:#06x}, device {:#06x})",
            adapter.index(),
            adapter.name(),
            adapter.vendor_id(),
            adapter.device_id()
        );

        let clear_color = config.device.clear_color();
        let device = adapter
            .create_device(GfxSurface::headless(settings.initial_extent), config)
            .context("创建 device 失败")?;

        {
            let _span = tracy_client::span!("OuterApp::init");
            outer_app.init(&device)?;
        }

        Ok(Self {
            settings,
            clear_color,
            outer_app: Some(outer_app),
            device: Some(device),
            provider: Some(provider),
            null,
        })
    }
}
// getters
impl RenderApp {
    #[inline]
    pub fn null_driver(&self) -> &Rc<NullDriver> {
        &self.null
    }

    #[inline]
    pub fn device(&self) -> Option<&GfxDevice> {
        self.device.as_ref()
    }
}
// update
impl RenderApp {
    pub fn run(&mut self) -> anyhow::Result<()> {
        for frame in 0..self.settings.frame_count {
            self.render_frame().with_context(|| format!("第 {} 帧渲染失败", frame))?;
            tracy_client::frame_mark();

            if let Some((resize_frame, extent)) = self.settings.resize_at {
                if frame + 1 == resize_frame {
                    let device = self.device.as_ref().context("device 已经销毁")?;
                    device.on_surface_resized(extent)?;
                    log::info!("surface resized to {}x{}", extent.width, extent.height);
                }
            }
        }
        log::info!("render {} frames, {} draws executed", self.settings.frame_count, self.null.executed_draw_count());
        Ok(())
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("RenderApp::render_frame");
        let device = self.device.as_ref().context("device 已经销毁")?;
        let outer_app = self.outer_app.as_mut().context("outer app 已经销毁")?;

        let context = device.current_context()?;
        context.begin_frame()?;
        outer_app.prepare(context)?;
        context.begin_drawing(self.clear_color)?;
        outer_app.draw(context)?;
        context.end_drawing()?;
        context.end_frame()?;
        device.present_frame()?;
        Ok(())
    }
}
// destroy
impl RenderApp {
    /// 按照 outer app → device → provider 的顺序销毁
    ///
    /// # return
    /// 销毁之后仍然存活的原生对象，按类型统计
    pub fn destroy(mut self) -> Vec<(&'static str, usize)> {
        if let Some(device) = &self.device {
            if let Err(err) = device.wait_for_idle() {
                log::error!("wait for idle failed: {}", err);
            }
        }
        if let Some(mut outer_app) = self.outer_app.take() {
            outer_app.destroy();
        }
        if let Some(device) = self.device.take() {
            device.dispose();
        }
        if let Some(provider) = self.provider.take() {
            provider.dispose();
        }

        let leaks = self.null.live_objects();
        if leaks.is_empty() {
            log::info!("all native objects released");
        } else {
            log::error!("leaked native objects: {}", leaks.iter().map(|(kind, count)| format!("{kind} x{count}")).join(", "));
        }
        leaks
    }
}

/// 通过 D3D12 驱动列出本机的 adapter，不创建 device
#[cfg(all(windows, feature = "d3d12"))]
pub fn list_d3d12_adapters(config: &GfxConfig) -> anyhow::Result<()> {
    use tessera_gfx::native::d3d12::D3d12Driver;

    let d3d12 = Rc::new(D3d12Driver::new());
    let driver: Rc<dyn NativeDriver> = d3d12.clone();
    let provider = GfxProvider::new(driver, config.clone()).context("创建 D3D12 provider 失败")?;
    for adapter in provider.adapters().context("枚举 D3D12 adapter 失败")? {
        log::info!(
            "d3d12 adapter {}: {}, {} MiB, software: {}",
            adapter.index(),
            adapter.name(),
            adapter.dedicated_video_memory() >> 20,
            adapter.is_software()
        );
    }
    provider.dispose();
    if d3d12.live_object_count() != 0 {
        log::error!("leaked d3d12 objects: {:?}", d3d12.live_objects());
    }
    Ok(())
}
