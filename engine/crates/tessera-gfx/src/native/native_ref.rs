use std::fmt;
use std::rc::Rc;

use crate::native::driver::NativeDriver;
use crate::native::handles::NativeHandle;

/// 持有一个原生引用的 RAII 守卫
///
/// - 创建时接管调用方已经拥有的那一个引用（不会额外 AddRef）
/// - `Clone` 对应 AddRef
/// - `Drop` 对应恰好一次 Release
///
/// 原生句柄只能通过守卫保存，裸句柄（`handle()`）只在调用驱动时临时使用
pub struct NativeRef<K: NativeHandle> {
    driver: Rc<dyn NativeDriver>,
    handle: K,
}

impl<K: NativeHandle> NativeRef<K> {
    /// 接管一个已经 AddRef 过的句柄
    #[inline]
    pub fn attach(driver: &Rc<dyn NativeDriver>, handle: K) -> Self {
        Self {
            driver: driver.clone(),
            handle,
        }
    }

    #[inline]
    pub fn handle(&self) -> K {
        self.handle
    }

    #[inline]
    pub fn driver(&self) -> &Rc<dyn NativeDriver> {
        &self.driver
    }
}

impl<K: NativeHandle> Clone for NativeRef<K> {
    fn clone(&self) -> Self {
        self.driver.add_ref(self.handle.raw());
        Self {
            driver: self.driver.clone(),
            handle: self.handle,
        }
    }
}

impl<K: NativeHandle> Drop for NativeRef<K> {
    fn drop(&mut self) {
        let remaining = self.driver.release(self.handle.raw());
        log::trace!("release {:?}, remaining refs: {}", self.handle, remaining);
    }
}

impl<K: NativeHandle> fmt::Debug for NativeRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeRef").field(&self.handle).finish()
    }
}
