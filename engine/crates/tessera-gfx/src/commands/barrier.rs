use crate::native::{ALL_SUBRESOURCES, NativeResourceBarrier, ResourceHandle, ResourceState};

/// 便捷创建 transition barrier 的结构体
#[derive(Clone, Copy, Debug)]
pub struct GfxResourceBarrier {
    inner: NativeResourceBarrier,
}

impl GfxResourceBarrier {
    /// 默认作用于所有 subresource，状态不变
    pub fn new(resource: ResourceHandle) -> Self {
        Self {
            inner: NativeResourceBarrier {
                resource,
                subresource: ALL_SUBRESOURCES,
                before: ResourceState::COMMON,
                after: ResourceState::COMMON,
            },
        }
    }

    #[inline]
    pub fn inner(&self) -> &NativeResourceBarrier {
        &self.inner
    }

    /// before 与 after 相同的 barrier 不需要提交
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.inner.before == self.inner.after
    }

    /// builder
    #[inline]
    pub fn transition(mut self, before: ResourceState, after: ResourceState) -> Self {
        self.inner.before = before;
        self.inner.after = after;
        self
    }

    /// builder
    #[inline]
    pub fn subresource(mut self, subresource: u32) -> Self {
        self.inner.subresource = subresource;
        self
    }

    /// 交换 before 和 after，用于把资源恢复到原来的状态
    #[inline]
    pub fn reversed(mut self) -> Self {
        std::mem::swap(&mut self.inner.before, &mut self.inner.after);
        self
    }
}

impl From<GfxResourceBarrier> for NativeResourceBarrier {
    #[inline]
    fn from(barrier: GfxResourceBarrier) -> Self {
        barrier.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeHandle;

    #[test]
    fn test_reversed() {
        let barrier = GfxResourceBarrier::new(ResourceHandle::from_raw(7))
            .transition(ResourceState::PRESENT, ResourceState::RENDER_TARGET);
        assert!(!barrier.is_noop());

        let back = barrier.reversed();
        assert_eq!(back.inner().before, ResourceState::RENDER_TARGET);
        assert_eq!(back.inner().after, ResourceState::PRESENT);
        assert_eq!(back.inner().subresource, ALL_SUBRESOURCES);
    }
}
