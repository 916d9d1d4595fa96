use tessera_gfx::commands::context::GfxContext;
use tessera_gfx::error::GfxResult;
use tessera_gfx::foundation::device::GfxDevice;

/// 由具体示例实现，[`crate::app::RenderApp`] 在帧循环中调用
pub trait OuterApp {
    /// device 创建之后调用一次，在这里创建资源
    fn init(&mut self, device: &GfxDevice) -> anyhow::Result<()>;

    /// 在 `begin_drawing` 之前调用，可以录制拷贝命令
    fn prepare(&mut self, _context: &GfxContext) -> GfxResult<()> {
        Ok(())
    }

    /// 在 `begin_drawing` 和 `end_drawing` 之间调用
    fn draw(&self, context: &GfxContext) -> GfxResult<()>;

    /// device 销毁之前调用，GPU 已经空闲
    fn destroy(&mut self) {}
}
