pub mod barrier;
pub mod context;
pub mod fence;
