use std::rc::Rc;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::native::{NativeGraphicsPipelineDesc, NativeRef, PipelineStateHandle, PrimitiveTopology};
use crate::pipelines::pipeline_signature::GfxPipelineSignature;
use crate::pipelines::shader::{GfxShader, GfxShaderKind};

/// graphics pipeline state，延迟创建
///
/// 拓扑固定为三角形列表，render target 格式与 back buffer 一致
pub struct GfxPipeline {
    /// 多个 pipeline 可以共用同一个 signature，所以这里使用 Rc
    signature: Rc<GfxPipelineSignature>,
    vertex_shader: GfxShader,
    pixel_shader: Option<GfxShader>,

    pso: LazyNative<PipelineStateHandle>,
    lifecycle: GfxLifecycle,
    name: String,
}

// new & init
impl GfxPipeline {
    pub fn new(
        signature: Rc<GfxPipelineSignature>,
        vertex_shader: GfxShader,
        pixel_shader: Option<GfxShader>,
        name: impl Into<String>,
    ) -> GfxResult<Self> {
        signature.core().ensure_alive()?;
        if vertex_shader.kind() != GfxShaderKind::Vertex {
            return Err(GfxError::invalid_argument("vertex_shader", "expected a vertex shader"));
        }
        if pixel_shader.as_ref().is_some_and(|shader| shader.kind() != GfxShaderKind::Pixel) {
            return Err(GfxError::invalid_argument("pixel_shader", "expected a pixel shader"));
        }
        Ok(Self {
            signature,
            vertex_shader,
            pixel_shader,
            pso: LazyNative::new(),
            lifecycle: GfxLifecycle::new("GfxPipeline"),
            name: name.into(),
        })
    }
}

// getters
impl GfxPipeline {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Rc<GfxPipelineSignature> {
        &self.signature
    }

    #[inline]
    pub fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::TriangleList
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    pub fn pipeline_state(&self) -> GfxResult<PipelineStateHandle> {
        self.lifecycle.ensure_alive()?;
        self.pso.get_or_try_create(|| {
            let core = self.signature.core();
            let driver = core.driver();
            let desc = NativeGraphicsPipelineDesc {
                root_signature: self.signature.root_signature()?,
                vertex_shader: Some(self.vertex_shader.bytecode()),
                pixel_shader: self.pixel_shader.as_ref().map(|shader| shader.bytecode()),
                input_layout: self.signature.input_layout(),
                render_target_format: core.config().device.back_buffer_format,
            };
            let pso = driver
                .create_graphics_pipeline_state(core.device()?, &desc)
                .or_external("CreateGraphicsPipelineState")?;
            log::info!("create graphics pipeline {}: {:?}", self.name, pso);
            Ok(NativeRef::attach(driver, pso))
        })
    }
}

// destroy
impl GfxPipeline {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        self.pso.release();
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{GfxFormat, NativeStatus};
    use crate::pipelines::pipeline_signature::{GfxInputElement, GfxInputSemantic};
    use crate::test_utils::null_core;

    fn signature(core: &Rc<crate::foundation::device_core::GfxDeviceCore>) -> Rc<GfxPipelineSignature> {
        let inputs = vec![GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float)];
        Rc::new(GfxPipelineSignature::new(core, inputs, vec![], "sig").unwrap())
    }

    #[test]
    fn test_pipeline_state_is_lazy() {
        let (null, core) = null_core();
        let vs = GfxShader::new(GfxShaderKind::Vertex, vec![0xDE, 0xAD], "main").unwrap();
        let pipeline = GfxPipeline::new(signature(&core), vs, None, "pso").unwrap();
        assert_eq!(null.call_count("CreateGraphicsPipelineState"), 0);

        let pso = pipeline.pipeline_state().unwrap();
        assert_eq!(pipeline.pipeline_state().unwrap(), pso);
        assert_eq!(null.call_count("CreateGraphicsPipelineState"), 1);
        assert_eq!(null.call_count("CreateRootSignature"), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (null, core) = null_core();
        let vs = GfxShader::new(GfxShaderKind::Vertex, vec![1], "main").unwrap();
        let pipeline = GfxPipeline::new(signature(&core), vs, None, "pso").unwrap();

        null.fail_next_call("CreateGraphicsPipelineState", NativeStatus::E_OUTOFMEMORY);
        assert!(matches!(
            pipeline.pipeline_state(),
            Err(GfxError::ExternalCall {
                operation: "CreateGraphicsPipelineState",
                ..
            })
        ));
        assert!(pipeline.pipeline_state().is_ok());
    }

    #[test]
    fn test_shader_kind_checked() {
        let (_null, core) = null_core();
        let ps = GfxShader::new(GfxShaderKind::Pixel, vec![1], "main").unwrap();
        assert!(GfxPipeline::new(signature(&core), ps.clone(), None, "bad").is_err());
        let vs = GfxShader::new(GfxShaderKind::Vertex, vec![1], "main").unwrap();
        assert!(GfxPipeline::new(signature(&core), vs.clone(), Some(vs), "bad").is_err());
    }
}
