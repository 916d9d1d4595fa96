use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{GfxError, GfxResult};
use crate::memory::memory_block::{GfxMemoryBlock, GfxMemoryRegion};
use crate::memory::{GfxHeapCategory, GfxHeapKind};
use crate::native::{DeviceHandle, NativeAllocationInfo, NativeDriver};

/// 按 (kind, category) 管理 memory block
///
/// 已有的 block 都放不下时，新建一个 `max(block_size, 对齐后的请求大小)` 的 block
pub struct GfxMemoryAllocator {
    block_size: u64,
    blocks: RefCell<Vec<Rc<GfxMemoryBlock>>>,
}

// new & init
impl GfxMemoryAllocator {
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size,
            blocks: RefCell::new(vec![]),
        }
    }
}

// getters
impl GfxMemoryAllocator {
    #[inline]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn blocks(&self) -> Vec<Rc<GfxMemoryBlock>> {
        self.blocks.borrow().clone()
    }
}

// tools
impl GfxMemoryAllocator {
    pub fn allocate(
        &self,
        driver: &Rc<dyn NativeDriver>,
        device: DeviceHandle,
        kind: GfxHeapKind,
        category: GfxHeapCategory,
        info: NativeAllocationInfo,
    ) -> GfxResult<GfxMemoryRegion> {
        let blocks = self.blocks();
        for block in blocks.iter().filter(|b| b.kind() == kind && b.category() == category) {
            if let Some(region) = block.try_allocate(info.size, info.alignment)? {
                return Ok(region);
            }
        }

        let Some(block_size) = info.size.checked_next_multiple_of(info.alignment.max(1)) else {
            return Err(GfxError::OutOfMemory {
                requested: info.size,
                available: 0,
            });
        };
        let block_size = block_size.max(self.block_size);
        let block = GfxMemoryBlock::new(driver, device, kind, category, block_size, info.alignment)?;
        self.blocks.borrow_mut().push(block.clone());

        block.try_allocate(info.size, info.alignment)?.ok_or(GfxError::OutOfMemory {
            requested: info.size,
            available: block.remaining(),
        })
    }

    /// 释放 allocator 对所有 block 的引用
    ///
    /// 仍然存活的 region 会让对应的 block 保持存活
    pub fn release_blocks(&self) {
        let blocks = std::mem::take(&mut *self.blocks.borrow_mut());
        log::debug!("release {} memory blocks", blocks.len());
        drop(blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::null::{NullDriver, NULL_PLACEMENT_ALIGNMENT};

    const KB64: u64 = NULL_PLACEMENT_ALIGNMENT;

    fn setup() -> (Rc<NullDriver>, Rc<dyn NativeDriver>, DeviceHandle) {
        let null = Rc::new(NullDriver::new());
        let driver: Rc<dyn NativeDriver> = null.clone();
        let factory = driver.create_factory(false).unwrap();
        let adapter = driver.enum_adapter(factory, 0).unwrap();
        let device = driver.create_device(adapter).unwrap();
        (null, driver, device)
    }

    fn info(size: u64) -> NativeAllocationInfo {
        NativeAllocationInfo {
            size,
            alignment: KB64,
        }
    }

    #[test]
    fn test_reuse_block_of_same_kind() {
        let (null, driver, device) = setup();
        let allocator = GfxMemoryAllocator::new(4 * KB64);

        let a = allocator.allocate(&driver, device, GfxHeapKind::Default, GfxHeapCategory::Buffers, info(KB64)).unwrap();
        let b = allocator.allocate(&driver, device, GfxHeapKind::Default, GfxHeapCategory::Buffers, info(KB64)).unwrap();
        assert!(Rc::ptr_eq(a.block(), b.block()));
        assert_eq!((a.offset(), b.offset()), (0, KB64));

        // 不同 kind 使用不同的 block
        let c = allocator.allocate(&driver, device, GfxHeapKind::Upload, GfxHeapCategory::Buffers, info(KB64)).unwrap();
        assert!(!Rc::ptr_eq(a.block(), c.block()));
        assert_eq!(allocator.block_count(), 2);
        assert_eq!(null.call_count("CreateHeap"), 2);
    }

    #[test]
    fn test_large_request_gets_dedicated_block() {
        let (_null, driver, device) = setup();
        let allocator = GfxMemoryAllocator::new(2 * KB64);

        let large = allocator
            .allocate(&driver, device, GfxHeapKind::Default, GfxHeapCategory::Textures, info(5 * KB64 + 1))
            .unwrap();
        assert_eq!(large.block().size(), 6 * KB64);
        assert_eq!(large.offset(), 0);
    }

    #[test]
    fn test_new_block_when_full() {
        let (_null, driver, device) = setup();
        let allocator = GfxMemoryAllocator::new(2 * KB64);
        let regions = (0..3)
            .map(|_| {
                allocator.allocate(&driver, device, GfxHeapKind::Readback, GfxHeapCategory::Buffers, info(KB64)).unwrap()
            })
            .collect::<Vec<_>>();

        assert_eq!(allocator.block_count(), 2);
        assert_eq!(regions[2].offset(), 0);
    }

    #[test]
    fn test_release_blocks_keeps_live_regions() {
        let (null, driver, device) = setup();
        let allocator = GfxMemoryAllocator::new(2 * KB64);
        let region =
            allocator.allocate(&driver, device, GfxHeapKind::Upload, GfxHeapCategory::Buffers, info(KB64)).unwrap();
        let heap = region.heap();

        allocator.release_blocks();
        assert_eq!(allocator.block_count(), 0);
        assert_eq!(null.ref_count(crate::native::NativeHandle::raw(heap)), Some(1));

        drop(region);
        assert_eq!(null.ref_count(crate::native::NativeHandle::raw(heap)), None);
    }
}
