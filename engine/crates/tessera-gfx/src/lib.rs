//! D3D12 风格图形驱动之上的 GFX 层
//!
//! 负责原生对象的生命周期与同步：延迟创建、在 heap 中按 offset 放置资源、
//! 基于 fence 的帧同步、以及 Initialized → Disposing → Disposed 的显式销毁。
//!
//! 原生驱动只通过 [`native::NativeDriver`] 访问，所有对象共享同一个 [`foundation::device_core::GfxDeviceCore`]。
//!
//! 单线程使用：所有对象基于 `Rc` / `Cell`，不能跨线程。

pub mod basic;
pub mod commands;
pub mod config;
pub mod error;
pub mod foundation;
pub mod memory;
pub mod native;
pub mod pipelines;
pub mod resources;
pub mod swapchain;

#[cfg(test)]
mod test_utils;
