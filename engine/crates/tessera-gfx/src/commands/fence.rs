use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::{
    EventHandle, FenceHandle, NativeRef, NativeWaitStatus, QueueHandle, INFINITE_WAIT_MS, MAX_FINITE_WAIT_MS,
};

/// CPU 与 GPU 之间的同步点
///
/// - 原生 fence 的值由 GPU 推进（completed value）
/// - `value` 是 CPU 侧等待的目标值
///
/// 原生 fence 和等待用的 OS event 都在第一次使用时创建
///
/// # Destroy
/// drop 时自动 dispose，也可以提前手动 dispose
pub struct GfxFence {
    core: Rc<GfxDeviceCore>,
    fence: LazyNative<FenceHandle>,
    event: LazyNative<EventHandle>,

    value: Cell<u64>,

    lifecycle: GfxLifecycle,
    name: String,
}

// new & init
impl GfxFence {
    pub fn new(core: &Rc<GfxDeviceCore>, name: impl Into<String>) -> Self {
        Self {
            core: core.clone(),
            fence: LazyNative::new(),
            event: LazyNative::new(),
            value: Cell::new(0),
            lifecycle: GfxLifecycle::new("GfxFence"),
            name: name.into(),
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 目标值，从 0 开始
    #[inline]
    pub fn signal_value(&self) -> u64 {
        self.value.get()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    pub fn native_fence(&self) -> GfxResult<FenceHandle> {
        self.lifecycle.ensure_alive()?;
        self.fence.get_or_try_create(|| {
            let driver = self.core.driver();
            let fence = driver.create_fence(self.core.device()?, 0).or_external("CreateFence")?;
            log::debug!("create fence {}: {:?}", self.name, fence);
            Ok(NativeRef::attach(driver, fence))
        })
    }

    fn native_event(&self) -> GfxResult<EventHandle> {
        self.event.get_or_try_create(|| {
            let driver = self.core.driver();
            let event = driver.create_event().or_external("CreateEventW")?;
            Ok(NativeRef::attach(driver, event))
        })
    }

    /// GPU 已经完成的值
    pub fn completed_value(&self) -> GfxResult<u64> {
        let fence = self.native_fence()?;
        Ok(self.core.driver().fence_completed_value(fence))
    }

    /// GPU 是否已经到达目标值，没有副作用
    pub fn is_signalled(&self) -> GfxResult<bool> {
        Ok(self.completed_value()? >= self.value.get())
    }
}

// tools
impl GfxFence {
    /// 只有已经 signal 时才推进目标值，避免在上一次 signal 还没完成时跳过一个值
    pub fn reset(&self) -> GfxResult<()> {
        let completed = self.completed_value()?;
        if completed >= self.value.get() {
            self.value.set(completed + 1);
        }
        Ok(())
    }

    /// 在 queue 上 signal 当前的目标值
    pub fn signal(&self, queue: QueueHandle) -> GfxResult<()> {
        let fence = self.native_fence()?;
        self.core.driver().queue_signal(queue, fence, self.value.get()).or_external("Signal")
    }

    /// 阻塞等待，超时返回 `Ok(false)`
    ///
    /// 超过单次原生等待上限的超时会被拆成多次等待
    pub fn try_wait(&self, timeout: Duration) -> GfxResult<bool> {
        let Ok(mut remaining_ms) = u64::try_from(timeout.as_millis()) else {
            return Err(GfxError::invalid_argument("timeout", format!("{timeout:?} does not fit in u64 milliseconds")));
        };

        let mut registered = None;
        loop {
            if self.is_signalled()? {
                return Ok(true);
            }
            if remaining_ms == 0 {
                return Ok(false);
            }

            let event = match registered {
                Some(event) => event,
                None => *registered.insert(self.register_event()?),
            };
            let chunk_ms = remaining_ms.min(MAX_FINITE_WAIT_MS as u64) as u32;
            match self.core.driver().wait_for_event(event, chunk_ms).or_external("WaitForSingleObject")? {
                // event 可能是之前某次注册留下的，只能作为重新检查完成值的提示
                NativeWaitStatus::Signaled => registered = None,
                NativeWaitStatus::Timeout => remaining_ms -= chunk_ms as u64,
            }
        }
    }

    /// 无限等待
    pub fn wait(&self) -> GfxResult<()> {
        let mut registered = None;
        while !self.is_signalled()? {
            let event = match registered {
                Some(event) => event,
                None => *registered.insert(self.register_event()?),
            };
            match self.core.driver().wait_for_event(event, INFINITE_WAIT_MS).or_external("WaitForSingleObject")? {
                NativeWaitStatus::Signaled => registered = None,
                NativeWaitStatus::Timeout => {}
            }
        }
        Ok(())
    }

    /// 让 OS event 在 fence 到达目标值时被 signal
    fn register_event(&self) -> GfxResult<EventHandle> {
        let fence = self.native_fence()?;
        let event = self.native_event()?;
        self.core
            .driver()
            .fence_set_event_on_completion(fence, self.value.get(), event)
            .or_external("SetEventOnCompletion")?;
        Ok(event)
    }
}

// destroy
impl GfxFence {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        self.fence.release();
        self.event.release();
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxFence {
    fn drop(&mut self) {
        self.dispose();
    }
}
