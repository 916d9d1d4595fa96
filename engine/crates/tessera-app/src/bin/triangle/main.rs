use tessera_app::app::{RenderApp, RunSettings};
use tessera_app::outer_app::OuterApp;
use tessera_gfx::commands::context::GfxContext;
use tessera_gfx::error::GfxResult;
use tessera_gfx::foundation::device::GfxDevice;

mod triangle_scene;

use triangle_scene::TriangleScene;

#[derive(Default)]
struct HelloTriangle {
    scene: Option<TriangleScene>,
}
impl OuterApp for HelloTriangle {
    fn init(&mut self, device: &GfxDevice) -> anyhow::Result<()> {
        log::info!("hello triangle init.");
        self.scene = Some(TriangleScene::new(device)?);
        Ok(())
    }

    fn prepare(&mut self, context: &GfxContext) -> GfxResult<()> {
        match self.scene.as_mut() {
            Some(scene) => scene.prepare(context),
            None => Ok(()),
        }
    }

    fn draw(&self, context: &GfxContext) -> GfxResult<()> {
        match self.scene.as_ref() {
            Some(scene) => scene.draw(context),
            None => Ok(()),
        }
    }

    fn destroy(&mut self) {
        self.scene = None;
    }
}

fn main() -> anyhow::Result<()> {
    RenderApp::init_env();

    let config = RenderApp::load_config()?;

    #[cfg(all(windows, feature = "d3d12"))]
    if let Err(err) = tessera_app::app::list_d3d12_adapters(&config) {
        log::error!("{:#}", err);
    }

    let mut app = RenderApp::new(config, RunSettings::default(), Box::new(HelloTriangle::default()))?;
    let result = app.run();
    let leaks = app.destroy();
    result?;

    if !leaks.is_empty() {
        anyhow::bail!("{} kinds of native objects leaked", leaks.len());
    }
    log::info!("end run.");
    Ok(())
}
