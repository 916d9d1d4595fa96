//! 原生图形驱动的调用边界
//!
//! D3D12 / DXGI 本身不在这里重新实现：上层只通过 [`NativeDriver`] 里的一小组操作
//! （创建资源、map/unmap、signal/wait fence、present 等）调用它。
//!
//! - [`null::NullDriver`]：纯软件实现，用于测试和无窗口运行
//! - `d3d12::D3d12Driver`：windows 上基于 `windows` crate 的真实驱动（feature `d3d12`）

mod command;
mod driver;
mod handles;
mod native_ref;
mod status;
mod types;

pub mod handle_table;
pub mod null;

#[cfg(all(windows, feature = "d3d12"))]
pub mod d3d12;

pub use command::NativeCommand;
pub use driver::NativeDriver;
pub use handles::*;
pub use native_ref::NativeRef;
pub use status::*;
pub use types::*;
