use raw_window_handle::RawWindowHandle;

use crate::native::GfxExtent2D;

/// 呈现目标：一个窗口（或者没有窗口）加上它的像素尺寸
///
/// 没有窗口的 surface 只能用于不需要真正呈现的驱动（null driver）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GfxSurface {
    window: Option<RawWindowHandle>,
    extent: GfxExtent2D,
}

// new & init
impl GfxSurface {
    pub fn from_window(window: RawWindowHandle, extent: GfxExtent2D) -> Self {
        Self {
            window: Some(window),
            extent,
        }
    }

    pub fn headless(extent: GfxExtent2D) -> Self {
        Self { window: None, extent }
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn window(&self) -> Option<RawWindowHandle> {
        self.window
    }

    #[inline]
    pub fn extent(&self) -> GfxExtent2D {
        self.extent
    }

    #[inline]
    pub fn is_headless(&self) -> bool {
        self.window.is_none()
    }
}

// update
impl GfxSurface {
    #[inline]
    pub fn set_extent(&mut self, extent: GfxExtent2D) {
        self.extent = extent;
    }
}
