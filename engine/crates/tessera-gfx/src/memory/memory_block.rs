use std::cell::Cell;
use std::rc::Rc;

use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::memory::{GfxHeapCategory, GfxHeapKind};
use crate::native::{DeviceHandle, HeapHandle, NativeDriver, NativeHeapDesc, NativeRef};

/// 一个固定大小的原生 heap，资源按 offset 放置在其中
///
/// 使用 bump 分配：offset 只增不减，释放的区域不会被复用，只记录在统计数据里
pub struct GfxMemoryBlock {
    heap: NativeRef<HeapHandle>,

    kind: GfxHeapKind,
    category: GfxHeapCategory,
    size: u64,

    next_offset: Cell<u64>,
    live_allocations: Cell<u32>,
    freed_bytes: Cell<u64>,
}

// new & init
impl GfxMemoryBlock {
    pub fn new(
        driver: &Rc<dyn NativeDriver>,
        device: DeviceHandle,
        kind: GfxHeapKind,
        category: GfxHeapCategory,
        size: u64,
        alignment: u64,
    ) -> GfxResult<Rc<Self>> {
        let desc = NativeHeapDesc {
            size,
            alignment,
            kind,
            category,
        };
        let heap = driver.create_heap(device, &desc).or_external("CreateHeap")?;
        log::info!("create memory block: {:?}/{:?}, {} bytes", kind, category, size);

        Ok(Rc::new(Self {
            heap: NativeRef::attach(driver, heap),
            kind,
            category,
            size,
            next_offset: Cell::new(0),
            live_allocations: Cell::new(0),
            freed_bytes: Cell::new(0),
        }))
    }
}

// getters
impl GfxMemoryBlock {
    #[inline]
    pub fn heap(&self) -> HeapHandle {
        self.heap.handle()
    }

    #[inline]
    pub fn kind(&self) -> GfxHeapKind {
        self.kind
    }

    #[inline]
    pub fn category(&self) -> GfxHeapCategory {
        self.category
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 已经分配出去的字节数（包括已释放的区域和对齐产生的空隙）
    #[inline]
    pub fn used(&self) -> u64 {
        self.next_offset.get()
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.size - self.next_offset.get()
    }

    #[inline]
    pub fn live_allocations(&self) -> u32 {
        self.live_allocations.get()
    }

    #[inline]
    pub fn freed_bytes(&self) -> u64 {
        self.freed_bytes.get()
    }
}

// tools
impl GfxMemoryBlock {
    /// 放不下时返回 `Ok(None)`
    pub fn try_allocate(self: &Rc<Self>, size: u64, alignment: u64) -> GfxResult<Option<GfxMemoryRegion>> {
        if size == 0 {
            return Err(GfxError::invalid_argument("size", "allocation size must not be zero"));
        }
        if !alignment.is_power_of_two() {
            return Err(GfxError::invalid_argument("alignment", format!("{alignment} is not a power of two")));
        }

        let Some(offset) = self.next_offset.get().checked_next_multiple_of(alignment) else {
            return Ok(None);
        };
        match offset.checked_add(size) {
            Some(end) if end <= self.size => {
                self.next_offset.set(end);
                self.live_allocations.set(self.live_allocations.get() + 1);
                log::trace!("allocate [{}, {}) in {:?}", offset, end, self.heap());
                Ok(Some(GfxMemoryRegion {
                    block: self.clone(),
                    offset,
                    size,
                    freed: Cell::new(false),
                }))
            }
            _ => Ok(None),
        }
    }

    fn free(&self, size: u64) {
        self.live_allocations.set(self.live_allocations.get() - 1);
        self.freed_bytes.set(self.freed_bytes.get() + size);
    }
}

/// memory block 中的一段区域，drop 时自动归还给 block
pub struct GfxMemoryRegion {
    block: Rc<GfxMemoryBlock>,
    offset: u64,
    size: u64,
    freed: Cell<bool>,
}

// getters
impl GfxMemoryRegion {
    #[inline]
    pub fn block(&self) -> &Rc<GfxMemoryBlock> {
        &self.block
    }

    #[inline]
    pub fn heap(&self) -> HeapHandle {
        self.block.heap()
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_freed(&self) -> bool {
        self.freed.get()
    }
}

// destroy
impl GfxMemoryRegion {
    /// 多次调用只生效一次
    pub fn free(&self) {
        if self.freed.replace(true) {
            return;
        }
        self.block.free(self.size);
    }
}
impl Drop for GfxMemoryRegion {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::null::{NullDriver, NULL_PLACEMENT_ALIGNMENT};

    const KB64: u64 = NULL_PLACEMENT_ALIGNMENT;

    fn block(size: u64) -> Rc<GfxMemoryBlock> {
        let driver: Rc<dyn NativeDriver> = Rc::new(NullDriver::new());
        let factory = driver.create_factory(false).unwrap();
        let adapter = driver.enum_adapter(factory, 0).unwrap();
        let device = driver.create_device(adapter).unwrap();
        GfxMemoryBlock::new(&driver, device, GfxHeapKind::Upload, GfxHeapCategory::Buffers, size, KB64).unwrap()
    }

    #[test]
    fn test_bump_allocation_is_aligned_and_disjoint() {
        let block = block(4 * KB64);
        let a = block.try_allocate(100, KB64).unwrap().unwrap();
        let b = block.try_allocate(KB64 + 1, KB64).unwrap().unwrap();

        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), KB64);
        assert!(b.offset() >= a.offset() + a.size());
        assert_eq!(block.used(), 2 * KB64 + 1);
        assert_eq!(block.live_allocations(), 2);
    }

    #[test]
    fn test_allocation_that_does_not_fit() {
        let block = block(KB64);
        let _a = block.try_allocate(KB64 - 16, 16).unwrap().unwrap();
        assert!(block.try_allocate(32, 16).unwrap().is_none());
        // 失败的分配不移动 offset
        assert_eq!(block.used(), KB64 - 16);
        assert!(block.try_allocate(16, 16).unwrap().is_some());
        assert_eq!(block.remaining(), 0);
    }

    #[test]
    fn test_free_does_not_reuse_offsets() {
        let block = block(4 * KB64);
        let a = block.try_allocate(KB64, KB64).unwrap().unwrap();
        a.free();
        a.free();
        assert_eq!(block.live_allocations(), 0);
        assert_eq!(block.freed_bytes(), KB64);
        drop(a);
        assert_eq!(block.freed_bytes(), KB64);

        let b = block.try_allocate(KB64, KB64).unwrap().unwrap();
        assert_eq!(b.offset(), KB64);
    }

    #[test]
    fn test_invalid_arguments() {
        let block = block(KB64);
        assert!(matches!(block.try_allocate(0, 16), Err(GfxError::InvalidArgument { name: "size", .. })));
        assert!(matches!(block.try_allocate(16, 24), Err(GfxError::InvalidArgument { name: "alignment", .. })));
    }
}
