use std::cell::Cell;

use crate::error::{GfxError, GfxResult};

/// 需要显式销毁的对象所处的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxLifecycleState {
    Initialized,
    Disposing,
    Disposed,
}

impl GfxLifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            GfxLifecycleState::Initialized => "initialized",
            GfxLifecycleState::Disposing => "disposing",
            GfxLifecycleState::Disposed => "disposed",
        }
    }
}

/// Initialized → Disposing → Disposed 的状态机
///
/// 只能前进，不能回退
#[derive(Debug)]
pub struct GfxLifecycle {
    object: &'static str,
    state: Cell<GfxLifecycleState>,
}

impl GfxLifecycle {
    pub fn new(object: &'static str) -> Self {
        Self {
            object,
            state: Cell::new(GfxLifecycleState::Initialized),
        }
    }

    #[inline]
    pub fn state(&self) -> GfxLifecycleState {
        self.state.get()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.get() == GfxLifecycleState::Disposed
    }

    /// 对象还可以使用时返回 Ok，否则返回 [`GfxError::Disposed`]
    #[inline]
    pub fn ensure_alive(&self) -> GfxResult<()> {
        match self.state.get() {
            GfxLifecycleState::Initialized => Ok(()),
            _ => Err(GfxError::Disposed { object: self.object }),
        }
    }

    /// 进入 Disposing；已经在销毁或销毁完成时返回 false，调用方应当直接返回
    pub fn begin_dispose(&self) -> bool {
        if self.state.get() != GfxLifecycleState::Initialized {
            return false;
        }
        log::trace!("{} disposing", self.object);
        self.state.set(GfxLifecycleState::Disposing);
        true
    }

    pub fn end_dispose(&self) {
        debug_assert_eq!(self.state.get(), GfxLifecycleState::Disposing);
        log::trace!("{} disposed", self.object);
        self.state.set(GfxLifecycleState::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispose_only_once() {
        let lifecycle = GfxLifecycle::new("GfxFence");
        assert!(lifecycle.ensure_alive().is_ok());

        assert!(lifecycle.begin_dispose());
        assert_eq!(lifecycle.state(), GfxLifecycleState::Disposing);
        assert!(!lifecycle.begin_dispose());
        lifecycle.end_dispose();

        assert!(lifecycle.is_disposed());
        assert!(!lifecycle.begin_dispose());
        assert!(matches!(lifecycle.ensure_alive(), Err(GfxError::Disposed { object: "GfxFence" })));
    }
}
