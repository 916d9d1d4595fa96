//! provider → adapter → device 的对象层级
//!
//! 同一个 device 下的所有对象共享 [`device_core::GfxDeviceCore`]

pub mod adapter;
pub mod device;
pub mod device_core;
pub mod provider;
