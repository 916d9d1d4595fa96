use std::cell::{OnceCell, RefCell};

use crate::basic::lifecycle::GfxLifecycle;
use crate::config::GfxConfig;
use crate::error::{GfxError, GfxResult};
use crate::foundation::device::GfxDevice;
use crate::native::{AdapterHandle, FactoryHandle, NativeAdapterDesc, NativeRef};
use crate::swapchain::surface::GfxSurface;

/// 一张显卡
///
/// 持有自己的 factory 引用，provider 先于 adapter 销毁时 factory 仍然有效
///
/// # Destroy
/// drop 时自动 dispose
pub struct GfxAdapter {
    index: u32,
    factory: RefCell<Option<NativeRef<FactoryHandle>>>,
    adapter: RefCell<Option<NativeRef<AdapterHandle>>>,

    desc: NativeAdapterDesc,
    name: OnceCell<String>,

    lifecycle: GfxLifecycle,
}

// new & init
impl GfxAdapter {
    pub fn new(
        index: u32,
        factory: NativeRef<FactoryHandle>,
        adapter: NativeRef<AdapterHandle>,
        desc: NativeAdapterDesc,
    ) -> Self {
        Self {
            index,
            factory: RefCell::new(Some(factory)),
            adapter: RefCell::new(Some(adapter)),
            desc,
            name: OnceCell::new(),
            lifecycle: GfxLifecycle::new("GfxAdapter"),
        }
    }

    /// 定长的 UTF-16 名字，截断到第一个 NUL
    fn decode_name(description: &[u16]) -> String {
        let len = description.iter().position(|&c| c == 0).unwrap_or(description.len());
        String::from_utf16_lossy(&description[..len])
    }
}

// getters
impl GfxAdapter {
    /// 枚举时的序号
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn vendor_id(&self) -> u32 {
        self.desc.vendor_id
    }

    #[inline]
    pub fn device_id(&self) -> u32 {
        self.desc.device_id
    }

    #[inline]
    pub fn dedicated_video_memory(&self) -> u64 {
        self.desc.dedicated_video_memory
    }

    #[inline]
    pub fn is_software(&self) -> bool {
        self.desc.is_software
    }

    #[inline]
    pub fn desc(&self) -> &NativeAdapterDesc {
        &self.desc
    }

    /// 第一次访问时解码
    pub fn name(&self) -> &str {
        self.name.get_or_init(|| Self::decode_name(&self.desc.description))
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    pub fn native_adapter(&self) -> GfxResult<AdapterHandle> {
        self.lifecycle.ensure_alive()?;
        self.adapter.borrow().as_ref().map(NativeRef::handle).ok_or(GfxError::Disposed { object: "GfxAdapter" })
    }
}

// tools
impl GfxAdapter {
    /// device 持有自己的 factory 和 adapter 引用，与 adapter 的生命周期无关
    pub fn create_device(&self, surface: GfxSurface, config: GfxConfig) -> GfxResult<GfxDevice> {
        self.lifecycle.ensure_alive()?;
        let (Some(factory), Some(adapter)) = (self.factory.borrow().clone(), self.adapter.borrow().clone()) else {
            return Err(GfxError::Disposed { object: "GfxAdapter" });
        };
        log::info!("create device on adapter {}: {}", self.index, self.name());
        GfxDevice::new(factory, adapter, surface, config)
    }
}

// destroy
impl GfxAdapter {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let adapter = self.adapter.borrow_mut().take();
        drop(adapter);
        let factory = self.factory.borrow_mut().take();
        drop(factory);
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_name_stops_at_nul() {
        let mut description = [0u16; 128];
        for (dst, src) in description.iter_mut().zip("Null GPU".encode_utf16()) {
            *dst = src;
        }
        description[10] = 'x' as u16;
        assert_eq!(GfxAdapter::decode_name(&description), "Null GPU");
    }

    #[test]
    fn test_decode_name_without_nul() {
        let description = ['a' as u16; 128];
        assert_eq!(GfxAdapter::decode_name(&description).len(), 128);
    }
}
