use std::cell::RefCell;
use std::rc::Rc;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::config::GfxConfig;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::adapter::GfxAdapter;
use crate::native::{FactoryHandle, NativeDriver, NativeRef, NativeStatus};

/// 图形系统的入口：持有原生驱动和 DXGI factory，负责枚举 adapter
///
/// factory 在第一次使用时创建，是否开启 debug layer 由 `config.provider` 决定
///
/// # Destroy
/// drop 时自动 dispose
pub struct GfxProvider {
    driver: Rc<dyn NativeDriver>,
    config: GfxConfig,

    factory: LazyNative<FactoryHandle>,
    adapters: RefCell<Option<Vec<Rc<GfxAdapter>>>>,

    lifecycle: GfxLifecycle,
}

// new & init
impl GfxProvider {
    pub fn new(driver: Rc<dyn NativeDriver>, config: GfxConfig) -> GfxResult<Self> {
        config.validate()?;
        log::info!(
            "create provider on {} driver, debug layer: {}",
            driver.backend_name(),
            config.provider.enable_debug_layer
        );
        Ok(Self {
            driver,
            config,
            factory: LazyNative::new(),
            adapters: RefCell::new(None),
            lifecycle: GfxLifecycle::new("GfxProvider"),
        })
    }
}

// getters
impl GfxProvider {
    #[inline]
    pub fn driver(&self) -> &Rc<dyn NativeDriver> {
        &self.driver
    }

    #[inline]
    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    pub fn factory(&self) -> GfxResult<FactoryHandle> {
        self.lifecycle.ensure_alive()?;
        self.factory.get_or_try_create(|| {
            let factory = self
                .driver
                .create_factory(self.config.provider.enable_debug_layer)
                .or_external("CreateDXGIFactory2")?;
            log::info!("create factory: {:?}", factory);
            Ok(NativeRef::attach(&self.driver, factory))
        })
    }

    /// 只在第一次调用时枚举，逐个 index 枚举直到 `DXGI_ERROR_NOT_FOUND`
    pub fn adapters(&self) -> GfxResult<Vec<Rc<GfxAdapter>>> {
        self.lifecycle.ensure_alive()?;
        if let Some(adapters) = self.adapters.borrow().as_ref() {
            return Ok(adapters.clone());
        }

        let adapters = self.enumerate_adapters()?;
        *self.adapters.borrow_mut() = Some(adapters.clone());
        Ok(adapters)
    }

    fn enumerate_adapters(&self) -> GfxResult<Vec<Rc<GfxAdapter>>> {
        let factory = self.factory()?;
        let Some(factory_ref) = self.factory.get_ref() else {
            return Err(GfxError::Disposed { object: "GfxProvider" });
        };

        let mut adapters = vec![];
        for index in 0.. {
            let adapter = match self.driver.enum_adapter(factory, index) {
                Ok(adapter) => NativeRef::attach(&self.driver, adapter),
                Err(NativeStatus::DXGI_ERROR_NOT_FOUND) => break,
                Err(status) => {
                    return Err(GfxError::ExternalCall {
                        operation: "EnumAdapters1",
                        status,
                    });
                }
            };
            let desc = self.driver.adapter_desc(adapter.handle()).or_external("GetDesc1")?;
            let adapter = GfxAdapter::new(index, factory_ref.clone(), adapter, desc);
            log::info!(
                "found adapter {}: {} (vendor {:#06x}, device {:#06x}, {} MiB)",
                index,
                adapter.name(),
                adapter.vendor_id(),
                adapter.device_id(),
                adapter.dedicated_video_memory() / (1024 * 1024)
            );
            adapters.push(Rc::new(adapter));
        }
        Ok(adapters)
    }
}

// destroy
impl GfxProvider {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let adapters = self.adapters.borrow_mut().take().unwrap_or_default();
        for adapter in &adapters {
            if Rc::strong_count(adapter) > 1 {
                log::debug!("adapter {} is still referenced while the provider is disposed", adapter.index());
            }
            adapter.dispose();
        }
        self.factory.release();
        log::info!("provider disposed");
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::null::{NullAdapterInfo, NullDriver};

    fn provider(null: &Rc<NullDriver>) -> GfxProvider {
        GfxProvider::new(null.clone(), GfxConfig::default()).unwrap()
    }

    #[test]
    fn test_factory_is_lazy() {
        let null = Rc::new(NullDriver::new());
        let provider = provider(&null);
        assert_eq!(null.call_count("CreateDXGIFactory2"), 0);

        let factory = provider.factory().unwrap();
        assert_eq!(provider.factory().unwrap(), factory);
        assert_eq!(null.call_count("CreateDXGIFactory2"), 1);
    }

    #[test]
    fn test_enumerate_until_not_found() {
        let null = Rc::new(NullDriver::with_adapters(vec![
            NullAdapterInfo::new("First"),
            NullAdapterInfo::new("Second"),
        ]));
        let provider = provider(&null);

        let adapters = provider.adapters().unwrap();
        assert_eq!(adapters.iter().map(|adapter| adapter.name()).collect::<Vec<_>>(), vec!["First", "Second"]);
        assert_eq!(null.call_count("EnumAdapters1"), 3);

        // 只枚举一次
        provider.adapters().unwrap();
        assert_eq!(null.call_count("EnumAdapters1"), 3);
    }

    #[test]
    fn test_enumeration_failure_is_fatal() {
        let null = Rc::new(NullDriver::new());
        let provider = provider(&null);

        null.fail_next_call("EnumAdapters1", NativeStatus::DXGI_ERROR_DEVICE_REMOVED);
        let Err(err) = provider.adapters() else {
            panic!("enumeration should fail");
        };
        assert_eq!(err.native_status(), Some(NativeStatus::DXGI_ERROR_DEVICE_REMOVED));

        // 失败不会被缓存
        assert_eq!(provider.adapters().unwrap().len(), 1);
    }

    #[test]
    fn test_dispose_releases_everything() {
        let null = Rc::new(NullDriver::new());
        let provider = provider(&null);
        let adapter = provider.adapters().unwrap().remove(0);
        assert!(null.live_object_count() > 0);

        provider.dispose();
        assert!(adapter.is_disposed());
        assert!(matches!(adapter.native_adapter(), Err(GfxError::Disposed { .. })));
        assert!(matches!(provider.adapters(), Err(GfxError::Disposed { object: "GfxProvider" })));
        assert_eq!(null.live_object_count(), 0);
    }
}
