pub mod color;
pub mod lazy;
pub mod lifecycle;
