//! 在 null driver 上从 provider 一路走到 present 的端到端测试

use std::rc::Rc;

use tessera_crate_tools::init_log::init_test_log;
use tessera_gfx::basic::color::GfxColor;
use tessera_gfx::config::GfxConfig;
use tessera_gfx::error::GfxError;
use tessera_gfx::foundation::device::GfxDevice;
use tessera_gfx::foundation::provider::GfxProvider;
use tessera_gfx::native::null::{NullAdapterInfo, NullDriver};
use tessera_gfx::native::{GfxExtent2D, NativeStatus};
use tessera_gfx::swapchain::surface::GfxSurface;

struct Harness {
    null: Rc<NullDriver>,
    provider: GfxProvider,
    device: GfxDevice,
}

fn setup(config: GfxConfig) -> Harness {
    init_test_log();
    let null = Rc::new(NullDriver::new());
    let provider = GfxProvider::new(null.clone(), config.clone()).unwrap();
    let adapter = provider.adapters().unwrap().remove(0);
    let device = adapter.create_device(GfxSurface::headless(GfxExtent2D::new(64, 48)), config).unwrap();
    Harness { null, provider, device }
}

fn config_with_buffers(count: u32) -> GfxConfig {
    let mut config = GfxConfig::default();
    config.device.back_buffer_count = count;
    config.device.sync_interval = 0;
    config
}

fn render_frame(device: &GfxDevice) {
    let context = device.current_context().unwrap();
    context.begin_frame().unwrap();
    context.begin_drawing(GfxColor::CORNFLOWER_BLUE).unwrap();
    context.end_drawing().unwrap();
    context.end_frame().unwrap();
    device.present_frame().unwrap();
}

#[test]
fn test_context_index_follows_back_buffer() {
    let harness = setup(config_with_buffers(3));
    let device = &harness.device;
    assert_eq!(device.contexts().len(), 3);
    assert_eq!(device.current_context_index(), 0);

    for frame in 1..=7 {
        render_frame(device);
        let swapchain = device.swapchain().unwrap();
        assert_eq!(device.current_context_index(), swapchain.current_back_buffer_index());
        assert_eq!(device.current_context_index(), frame % 3);
    }

    let swapchain = device.swapchain().unwrap();
    assert_eq!(harness.null.present_count(swapchain.handle()), 7);
    assert_eq!(harness.null.validation_errors(), Vec::<String>::new());
}

#[test]
fn test_each_context_resets_and_closes_once_per_frame() {
    let harness = setup(config_with_buffers(2));
    let device = &harness.device;

    for _ in 0..6 {
        render_frame(device);
    }
    for context in device.contexts() {
        let stats = harness.null.command_list_stats(context.native_command_list().unwrap()).unwrap();
        assert_eq!(stats.reset_count, 3);
        assert_eq!(stats.close_count, 3);
        assert!(!stats.is_open);
    }
}

#[test]
fn test_enumeration_stops_at_not_found() {
    init_test_log();
    let null = Rc::new(NullDriver::with_adapters(vec![
        NullAdapterInfo::new("Primary"),
        NullAdapterInfo {
            is_software: false,
            dedicated_video_memory: 8 << 30,
            ..NullAdapterInfo::new("Discrete")
        },
    ]));
    let provider = GfxProvider::new(null.clone(), GfxConfig::default()).unwrap();

    let adapters = provider.adapters().unwrap();
    assert_eq!(adapters.len(), 2);
    assert_eq!(adapters[1].name(), "Discrete");
    assert!(!adapters[1].is_software());
    assert_eq!(adapters[1].dedicated_video_memory(), 8 << 30);
    // 两次成功，一次 DXGI_ERROR_NOT_FOUND
    assert_eq!(null.call_count("EnumAdapters1"), 3);
}

#[test]
fn test_resize_recreates_back_buffers() {
    let harness = setup(config_with_buffers(2));
    let device = &harness.device;
    render_frame(device);
    render_frame(device);
    render_frame(device);
    assert_eq!(device.current_context_index(), 1);

    device.on_surface_resized(GfxExtent2D::new(128, 96)).unwrap();
    let swapchain = device.swapchain().unwrap();
    assert_eq!(harness.null.swap_chain_extent(swapchain.handle()), Some(GfxExtent2D::new(128, 96)));
    assert_eq!(device.surface_extent(), GfxExtent2D::new(128, 96));
    assert_eq!(device.current_context_index(), 0);
    assert!(device.contexts().iter().all(|context| !context.has_render_target()));

    render_frame(device);
    render_frame(device);
    assert_eq!(harness.null.validation_errors(), Vec::<String>::new());
}

#[test]
fn test_minimized_surface_keeps_rendering() {
    let harness = setup(config_with_buffers(2));
    let device = &harness.device;
    render_frame(device);

    device.on_surface_resized(GfxExtent2D::new(0, 0)).unwrap();
    assert_eq!(harness.null.call_count("ResizeBuffers"), 0);
    render_frame(device);
    assert_eq!(device.surface_extent(), GfxExtent2D::new(64, 48));
}

#[test]
fn test_device_creation_failure_leaks_nothing() {
    init_test_log();
    let null = Rc::new(NullDriver::new());
    let provider = GfxProvider::new(null.clone(), GfxConfig::default()).unwrap();
    let adapter = provider.adapters().unwrap().remove(0);

    null.fail_next_call("CreateCommandQueue", NativeStatus::E_OUTOFMEMORY);
    let result = adapter.create_device(GfxSurface::headless(GfxExtent2D::new(16, 16)), GfxConfig::default());
    assert!(matches!(result, Err(GfxError::ExternalCall { operation: "CreateCommandQueue", .. })));

    drop(adapter);
    provider.dispose();
    assert_eq!(null.live_object_count(), 0);
}

#[test]
fn test_dispose_releases_every_native_object() {
    let Harness { null, provider, device } = setup(config_with_buffers(2));
    for _ in 0..4 {
        render_frame(&device);
    }
    device.wait_for_idle().unwrap();
    assert!(null.live_object_count() > 0);

    device.dispose();
    assert!(device.is_disposed());
    assert!(matches!(device.current_context(), Err(GfxError::Disposed { object: "GfxDevice" })));
    assert!(matches!(device.present_frame(), Err(GfxError::Disposed { .. })));

    provider.dispose();
    assert_eq!(null.live_objects(), Vec::<(&str, usize)>::new());
    assert_eq!(null.live_object_count(), 0);
}
