use std::ops::Range;

use crate::error::GfxResult;
use crate::native::{ResourceHandle, ResourceState};
use crate::resources::placed_resource::GfxPlacedResource;
use crate::resources::resource_state::{GfxCpuAccess, GfxResourceKind};

/// buffer 与 texture 的公共接口
///
/// 实现者只需要提供 [`GfxResource::placed`]
pub trait GfxResource {
    fn placed(&self) -> &GfxPlacedResource;

    #[inline]
    fn name(&self) -> &str {
        self.placed().name()
    }

    #[inline]
    fn resource_kind(&self) -> GfxResourceKind {
        self.placed().kind()
    }

    #[inline]
    fn cpu_access(&self) -> GfxCpuAccess {
        self.placed().cpu_access()
    }

    /// 由 (CPU 访问方式, 资源类型) 决定，结果会被缓存
    #[inline]
    fn default_state(&self) -> ResourceState {
        self.placed().default_state()
    }

    /// 第一次访问时创建原生资源
    #[inline]
    fn native_resource(&self) -> GfxResult<ResourceHandle> {
        self.placed().native_resource()
    }

    #[inline]
    fn region_offset(&self) -> Option<u64> {
        self.placed().region_offset()
    }

    #[inline]
    fn is_disposed(&self) -> bool {
        self.placed().is_disposed()
    }

    #[inline]
    fn dispose(&self) {
        self.placed().dispose()
    }

    // map & unmap
    #[inline]
    fn map<T>(&self) -> GfxResult<*mut T>
    where
        Self: Sized,
    {
        self.placed().map()
    }

    #[inline]
    fn map_range<T>(&self, range: Range<usize>) -> GfxResult<*mut T>
    where
        Self: Sized,
    {
        self.placed().map_range(range)
    }

    #[inline]
    fn map_for_read<T>(&self, range: Range<usize>) -> GfxResult<*mut T>
    where
        Self: Sized,
    {
        self.placed().map_for_read(range)
    }

    #[inline]
    fn unmap(&self) -> GfxResult<()> {
        self.placed().unmap()
    }

    #[inline]
    fn unmap_and_write(&self, range: Range<usize>) -> GfxResult<()> {
        self.placed().unmap_and_write(range)
    }

    #[inline]
    fn write_data<T: bytemuck::Pod>(&self, offset: usize, data: &[T]) -> GfxResult<()>
    where
        Self: Sized,
    {
        self.placed().write_data(offset, data)
    }

    #[inline]
    fn read_data<T: bytemuck::Pod>(&self, offset: usize, count: usize) -> GfxResult<Vec<T>>
    where
        Self: Sized,
    {
        self.placed().read_data(offset, count)
    }
}
