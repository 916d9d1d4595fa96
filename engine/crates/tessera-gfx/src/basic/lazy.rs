use std::cell::RefCell;

use crate::error::GfxResult;
use crate::native::{NativeHandle, NativeRef};

/// 第一次访问时才创建的原生对象
///
/// 创建失败时不会缓存错误，下一次访问会重新尝试
pub struct LazyNative<K: NativeHandle> {
    slot: RefCell<Option<NativeRef<K>>>,
}

impl<K: NativeHandle> Default for LazyNative<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NativeHandle> LazyNative<K> {
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    /// 已经创建则直接返回句柄，否则调用 `create` 创建
    pub fn get_or_try_create(&self, create: impl FnOnce() -> GfxResult<NativeRef<K>>) -> GfxResult<K> {
        if let Some(native) = self.slot.borrow().as_ref() {
            return Ok(native.handle());
        }
        // create 中可能访问其他 lazy 对象，不能持有 borrow
        let native = create()?;
        let handle = native.handle();
        *self.slot.borrow_mut() = Some(native);
        Ok(handle)
    }

    #[inline]
    pub fn get(&self) -> Option<K> {
        self.slot.borrow().as_ref().map(|native| native.handle())
    }

    /// 额外持有一个引用（AddRef）
    #[inline]
    pub fn get_ref(&self) -> Option<NativeRef<K>> {
        self.slot.borrow().clone()
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// 释放已经创建的对象，之后可以再次创建
    pub fn release(&self) -> bool {
        // 先取出再 drop，避免 Release 时仍持有 borrow
        let native = self.slot.borrow_mut().take();
        native.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::native::null::NullDriver;
    use crate::native::{FenceHandle, NativeDriver};

    fn setup() -> (Rc<dyn NativeDriver>, crate::native::DeviceHandle) {
        let driver: Rc<dyn NativeDriver> = Rc::new(NullDriver::new());
        let factory = driver.create_factory(false).unwrap();
        let adapter = driver.enum_adapter(factory, 0).unwrap();
        let device = driver.create_device(adapter).unwrap();
        (driver, device)
    }

    #[test]
    fn test_create_once() {
        let (driver, device) = setup();
        let lazy = LazyNative::<FenceHandle>::new();
        let mut created = 0;

        for _ in 0..3 {
            lazy.get_or_try_create(|| {
                created += 1;
                Ok(NativeRef::attach(&driver, driver.create_fence(device, 0).unwrap()))
            })
            .unwrap();
        }
        assert_eq!(created, 1);
        assert!(lazy.is_created());

        let fence = lazy.get().unwrap();
        assert!(lazy.release());
        assert!(!lazy.release());
        assert_eq!(driver.add_ref(fence.raw()), 0);
    }

    #[test]
    fn test_failed_creation_is_retried() {
        let (driver, device) = setup();
        let lazy = LazyNative::<FenceHandle>::new();

        let err = lazy.get_or_try_create(|| Err(crate::error::GfxError::invalid_argument("value", "boom")));
        assert!(err.is_err());
        assert!(!lazy.is_created());

        assert!(lazy.get_or_try_create(|| Ok(NativeRef::attach(&driver, driver.create_fence(device, 0).unwrap()))).is_ok());
    }
}
