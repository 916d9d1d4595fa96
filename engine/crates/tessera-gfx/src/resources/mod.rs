//! GPU 资源：buffer、texture 以及它们的视图
//!
//! 所有资源都是 placed resource：第一次访问原生资源时才从 memory block 中分配区域

pub mod buffer;
pub mod placed_resource;
pub mod resource;
pub mod resource_state;
pub mod texture;
pub mod views;
