//! Tessera 的 headless 示例程序框架
//!
//! [`app::RenderApp`] 负责环境初始化、driver 选择、帧循环和销毁，
//! 具体的绘制内容由 [`outer_app::OuterApp`] 提供。

pub mod app;
pub mod outer_app;
