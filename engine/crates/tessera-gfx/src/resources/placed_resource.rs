use std::cell::{OnceCell, RefCell};
use std::ops::Range;
use std::rc::Rc;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::device_core::GfxDeviceCore;
use crate::memory::memory_block::GfxMemoryRegion;
use crate::memory::GfxHeapCategory;
use crate::native::{NativeRef, NativeResourceDesc, ResourceHandle, ResourceState};
use crate::resources::resource_state::{default_resource_state, GfxCpuAccess, GfxResourceKind};

/// buffer 和 texture 共享的部分：heap 中的一段区域加上一个延迟创建的 placed resource
pub struct GfxPlacedResource {
    core: Rc<GfxDeviceCore>,

    kind: GfxResourceKind,
    cpu_access: GfxCpuAccess,
    desc: NativeResourceDesc,
    /// CPU 可见的字节数，map 的范围不能超过它
    byte_size: u64,

    default_state: OnceCell<ResourceState>,
    region: RefCell<Option<GfxMemoryRegion>>,
    native: LazyNative<ResourceHandle>,

    lifecycle: GfxLifecycle,
    name: String,
}

// new & init
impl GfxPlacedResource {
    pub(crate) fn new(
        core: &Rc<GfxDeviceCore>,
        object: &'static str,
        kind: GfxResourceKind,
        cpu_access: GfxCpuAccess,
        desc: NativeResourceDesc,
        byte_size: u64,
        name: String,
    ) -> Self {
        Self {
            core: core.clone(),
            kind,
            cpu_access,
            desc,
            byte_size,
            default_state: OnceCell::new(),
            region: RefCell::new(None),
            native: LazyNative::new(),
            lifecycle: GfxLifecycle::new(object),
            name,
        }
    }
}

// getters
impl GfxPlacedResource {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> GfxResourceKind {
        self.kind
    }

    #[inline]
    pub fn cpu_access(&self) -> GfxCpuAccess {
        self.cpu_access
    }

    #[inline]
    pub fn desc(&self) -> &NativeResourceDesc {
        &self.desc
    }

    #[inline]
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    #[inline]
    pub(crate) fn core(&self) -> &Rc<GfxDeviceCore> {
        &self.core
    }

    #[inline]
    pub fn ensure_alive(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// 只计算一次
    #[inline]
    pub fn default_state(&self) -> ResourceState {
        *self.default_state.get_or_init(|| default_resource_state(self.cpu_access, self.kind))
    }

    /// 资源在 heap 中的 offset，原生资源尚未创建时为 None
    pub fn region_offset(&self) -> Option<u64> {
        self.region.borrow().as_ref().map(|region| region.offset())
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.native.is_created()
    }

    /// 第一次访问时分配 heap 区域并创建 placed resource
    pub fn native_resource(&self) -> GfxResult<ResourceHandle> {
        self.lifecycle.ensure_alive()?;
        self.native.get_or_try_create(|| {
            let category = if self.desc.is_buffer() { GfxHeapCategory::Buffers } else { GfxHeapCategory::Textures };
            let region = self.core.allocate_memory(self.cpu_access.heap_kind(), category, &self.desc)?;

            let driver = self.core.driver();
            let resource = driver
                .create_placed_resource(
                    self.core.device()?,
                    region.heap(),
                    region.offset(),
                    &self.desc,
                    self.default_state(),
                )
                .or_external("CreatePlacedResource")?;
            log::debug!(
                "create placed resource {}: {:?} at {:?}+{}",
                self.name,
                resource,
                region.heap(),
                region.offset()
            );

            *self.region.borrow_mut() = Some(region);
            Ok(NativeRef::attach(driver, resource))
        })
    }

    pub fn gpu_address(&self) -> GfxResult<u64> {
        let resource = self.native_resource()?;
        Ok(self.core.driver().resource_gpu_address(resource))
    }
}

// map & unmap
impl GfxPlacedResource {
    fn check_range(&self, range: &Range<usize>) -> GfxResult<()> {
        if range.start > range.end || range.end as u64 > self.byte_size {
            return Err(GfxError::invalid_argument(
                "range",
                format!("{range:?} is out of bounds of {} ({} bytes)", self.name, self.byte_size),
            ));
        }
        Ok(())
    }

    fn map_at<T>(&self, read_range: Option<Range<usize>>, offset: usize) -> GfxResult<*mut T> {
        self.lifecycle.ensure_alive()?;
        if self.cpu_access == GfxCpuAccess::None {
            return Err(GfxError::invalid_argument("cpu_access", format!("{} is not CPU accessible", self.name)));
        }

        let resource = self.native_resource()?;
        let driver = self.core.driver();
        let base = driver.map_resource(resource, read_range).or_external("Map")?;
        // offset 已经检查过不会超出资源范围
        let ptr = unsafe { base.add(offset) }.cast::<T>();
        if !ptr.is_aligned() {
            driver.unmap_resource(resource, Some(0..0));
            return Err(GfxError::invalid_argument(
                "range",
                format!("offset {offset} is not aligned for {}", std::any::type_name::<T>()),
            ));
        }
        Ok(ptr)
    }

    /// map 整个资源，CPU 可能读取任意位置
    pub fn map<T>(&self) -> GfxResult<*mut T> {
        self.map_at(None, 0)
    }

    /// map 一段只写入不读取的范围，返回指向 `range.start` 的指针
    pub fn map_range<T>(&self, range: Range<usize>) -> GfxResult<*mut T> {
        self.check_range(&range)?;
        self.map_at(Some(0..0), range.start)
    }

    /// map 一段需要读取的范围，返回指向 `range.start` 的指针
    pub fn map_for_read<T>(&self, range: Range<usize>) -> GfxResult<*mut T> {
        self.check_range(&range)?;
        let offset = range.start;
        self.map_at(Some(range), offset)
    }

    /// CPU 可能写入了整个资源
    pub fn unmap(&self) -> GfxResult<()> {
        self.unmap_written(None)
    }

    /// 只有 `range` 被 CPU 写入；空范围表示没有写入
    pub fn unmap_and_write(&self, range: Range<usize>) -> GfxResult<()> {
        self.check_range(&range)?;
        self.unmap_written(Some(range))
    }

    fn unmap_written(&self, written_range: Option<Range<usize>>) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        let Some(resource) = self.native.get() else {
            return Err(GfxError::InvalidState {
                object: "GfxPlacedResource",
                expected: "mapped",
                actual: "not created",
            });
        };
        self.core.driver().unmap_resource(resource, written_range);
        Ok(())
    }

    /// 把 `data` 写入 `offset` 开始的位置
    pub fn write_data<T: bytemuck::Pod>(&self, offset: usize, data: &[T]) -> GfxResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let Some(end) = offset.checked_add(bytes.len()) else {
            return Err(GfxError::invalid_argument("offset", "offset + data size overflows"));
        };
        let dst = self.map_range::<u8>(offset..end)?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        self.unmap_and_write(offset..end)
    }

    /// 从 `offset` 开始读取 `count` 个元素
    pub fn read_data<T: bytemuck::Pod>(&self, offset: usize, count: usize) -> GfxResult<Vec<T>> {
        let mut data = vec![T::zeroed(); count];
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut data);
        let Some(end) = offset.checked_add(dst.len()) else {
            return Err(GfxError::invalid_argument("offset", "offset + data size overflows"));
        };
        let src = self.map_for_read::<u8>(offset..end)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len());
        }
        self.unmap_and_write(0..0)?;
        Ok(data)
    }
}

// destroy
impl GfxPlacedResource {
    /// 释放原生资源（如果已经创建）并把区域还给 memory block
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        if self.native.release() {
            log::debug!("release placed resource {}", self.name);
        }
        if let Some(region) = self.region.borrow_mut().take() {
            region.free();
        }
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxPlacedResource {
    fn drop(&mut self) {
        self.dispose();
    }
}
