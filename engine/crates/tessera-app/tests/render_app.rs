use std::cell::Cell;
use std::rc::Rc;

use tessera_app::app::{RenderApp, RunSettings};
use tessera_app::outer_app::OuterApp;
use tessera_crate_tools::init_log::init_test_log;
use tessera_gfx::commands::context::GfxContext;
use tessera_gfx::config::GfxConfig;
use tessera_gfx::error::GfxResult;
use tessera_gfx::foundation::device::GfxDevice;
use tessera_gfx::native::GfxExtent2D;

/// 只统计回调次数的 outer app
struct CountingApp {
    prepared: Rc<Cell<u32>>,
    drawn: Rc<Cell<u32>>,
    destroyed: Rc<Cell<bool>>,
}

impl OuterApp for CountingApp {
    fn init(&mut self, _device: &GfxDevice) -> anyhow::Result<()> {
        Ok(())
    }

    fn prepare(&mut self, _context: &GfxContext) -> GfxResult<()> {
        self.prepared.set(self.prepared.get() + 1);
        Ok(())
    }

    fn draw(&self, _context: &GfxContext) -> GfxResult<()> {
        self.drawn.set(self.drawn.get() + 1);
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed.set(true);
    }
}

fn start_env() {
    init_test_log();
    tracy_client::Client::start();
}

#[test]
fn test_default_config_file_is_valid() {
    start_env();
    let config = RenderApp::load_config().unwrap();
    config.validate().unwrap();
    assert_eq!(config.device.back_buffer_count, 3);
    assert_eq!(config.device.sync_interval, 0);
}

#[test]
fn test_run_resize_and_destroy_without_leaks() {
    start_env();
    let prepared = Rc::new(Cell::new(0));
    let drawn = Rc::new(Cell::new(0));
    let destroyed = Rc::new(Cell::new(false));
    let outer_app = CountingApp {
        prepared: prepared.clone(),
        drawn: drawn.clone(),
        destroyed: destroyed.clone(),
    };

    let settings = RunSettings {
        frame_count: 6,
        initial_extent: GfxExtent2D::new(64, 64),
        resize_at: Some((3, GfxExtent2D::new(96, 80))),
    };
    let mut app = RenderApp::new(GfxConfig::default(), settings, Box::new(outer_app)).unwrap();
    app.run().unwrap();

    let null = app.null_driver().clone();
    assert_eq!(app.device().unwrap().surface_extent(), GfxExtent2D::new(96, 80));
    assert_eq!(null.call_count("ResizeBuffers"), 1);
    assert_eq!(null.validation_errors(), Vec::<String>::new());
    assert_eq!((prepared.get(), drawn.get()), (6, 6));

    let leaks = app.destroy();
    assert!(destroyed.get());
    assert_eq!(leaks, Vec::<(&str, usize)>::new());
    assert_eq!(null.live_object_count(), 0);
}
