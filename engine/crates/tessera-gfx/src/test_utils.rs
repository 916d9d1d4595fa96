use std::rc::Rc;

use crate::config::GfxConfig;
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::null::NullDriver;
use crate::native::{GfxExtent2D, NativeDriver, NativeRef};
use crate::swapchain::surface::GfxSurface;

/// 基于 null driver 的 device core，surface 为 64x64 的 headless surface
pub fn null_core() -> (Rc<NullDriver>, Rc<GfxDeviceCore>) {
    null_core_with(GfxConfig::default())
}

pub fn null_core_with(config: GfxConfig) -> (Rc<NullDriver>, Rc<GfxDeviceCore>) {
    let null = Rc::new(NullDriver::new());
    let driver: Rc<dyn NativeDriver> = null.clone();
    let factory = NativeRef::attach(&driver, driver.create_factory(false).unwrap());
    let adapter = NativeRef::attach(&driver, driver.enum_adapter(factory.handle(), 0).unwrap());
    let surface = GfxSurface::headless(GfxExtent2D::new(64, 64));
    (null, GfxDeviceCore::new(factory, adapter, surface, config))
}
