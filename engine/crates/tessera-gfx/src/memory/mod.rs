//! 基于 heap 的显存管理
//!
//! 资源不单独申请显存，而是以 offset 放置在一个固定大小的 heap（memory block）中

pub mod memory_allocator;
pub mod memory_block;

/// heap 的内存类型，由资源的 CPU 访问方式决定
pub type GfxHeapKind = crate::native::NativeHeapKind;
/// heap 中放置的资源类别
pub type GfxHeapCategory = crate::native::NativeHeapCategory;
