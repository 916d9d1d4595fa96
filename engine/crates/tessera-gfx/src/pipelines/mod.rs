pub mod pipeline;
pub mod pipeline_signature;
pub mod primitive;
pub mod shader;
