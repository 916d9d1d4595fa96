use std::rc::Rc;

use itertools::Itertools;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::{
    GfxFormat, NativeInputElement, NativeRef, NativeRootParameter, NativeRootSignatureDesc, NativeStaticSampler,
    RootSignatureHandle, ShaderVisibility,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxInputSemantic {
    Position,
    Color,
    Normal,
    TexCoord,
}

impl GfxInputSemantic {
    #[inline]
    pub fn semantic_name(self) -> &'static str {
        match self {
            GfxInputSemantic::Position => "POSITION",
            GfxInputSemantic::Color => "COLOR",
            GfxInputSemantic::Normal => "NORMAL",
            GfxInputSemantic::TexCoord => "TEXCOORD",
        }
    }
}

/// 顶点中的一个属性，按声明顺序紧密排列
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxInputElement {
    pub semantic: GfxInputSemantic,
    pub format: GfxFormat,
}

impl GfxInputElement {
    #[inline]
    pub const fn new(semantic: GfxInputSemantic, format: GfxFormat) -> Self {
        Self { semantic, format }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxPipelineResourceKind {
    ConstantBuffer,
    Texture,
}

/// pipeline 的一个输入资源，对应 root signature 中的一个参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxPipelineResource {
    pub kind: GfxPipelineResourceKind,
    pub visibility: ShaderVisibility,
}

impl GfxPipelineResource {
    #[inline]
    pub const fn new(kind: GfxPipelineResourceKind, visibility: ShaderVisibility) -> Self {
        Self { kind, visibility }
    }
}

/// 顶点输入布局 + 资源布局，延迟创建 root signature
///
/// - constant buffer 依次占用 `b0, b1, ...`，以 root CBV 的形式绑定
/// - texture 依次占用 `t0, t1, ...`，每个 texture 一个 descriptor table
/// - 有 texture 时额外添加一个静态的线性 sampler `s0`
pub struct GfxPipelineSignature {
    core: Rc<GfxDeviceCore>,

    inputs: Vec<GfxInputElement>,
    resources: Vec<GfxPipelineResource>,
    input_layout: Vec<NativeInputElement>,
    vertex_stride: u32,

    root_signature: LazyNative<RootSignatureHandle>,
    lifecycle: GfxLifecycle,
    name: String,
}

// new & init
impl GfxPipelineSignature {
    pub fn new(
        core: &Rc<GfxDeviceCore>,
        inputs: Vec<GfxInputElement>,
        resources: Vec<GfxPipelineResource>,
        name: impl Into<String>,
    ) -> GfxResult<Self> {
        core.ensure_alive()?;
        if inputs.is_empty() {
            return Err(GfxError::invalid_argument("inputs", "pipeline signature requires at least one input"));
        }
        if let Some(input) = inputs.iter().find(|input| input.format.bytes_per_element() == 0) {
            return Err(GfxError::invalid_argument(
                "inputs",
                format!("{:?} has no vertex format", input.semantic),
            ));
        }

        let input_layout = Self::build_input_layout(&inputs);
        let vertex_stride = inputs.iter().map(|input| input.format.bytes_per_element()).sum();
        Ok(Self {
            core: core.clone(),
            inputs,
            resources,
            input_layout,
            vertex_stride,
            root_signature: LazyNative::new(),
            lifecycle: GfxLifecycle::new("GfxPipelineSignature"),
            name: name.into(),
        })
    }

    /// 同一个 semantic 出现多次时 semantic index 递增
    fn build_input_layout(inputs: &[GfxInputElement]) -> Vec<NativeInputElement> {
        let mut offset = 0;
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let semantic_index = inputs[..i].iter().filter(|prev| prev.semantic == input.semantic).count() as u32;
                let element = NativeInputElement {
                    semantic_name: input.semantic.semantic_name(),
                    semantic_index,
                    format: input.format,
                    input_slot: 0,
                    aligned_byte_offset: offset,
                };
                offset += input.format.bytes_per_element();
                element
            })
            .collect_vec()
    }

    fn build_root_signature_desc(&self) -> NativeRootSignatureDesc {
        let mut cbv_register = 0;
        let mut srv_register = 0;
        let parameters = self
            .resources
            .iter()
            .map(|resource| match resource.kind {
                GfxPipelineResourceKind::ConstantBuffer => {
                    cbv_register += 1;
                    NativeRootParameter::ConstantBufferView {
                        register: cbv_register - 1,
                        visibility: resource.visibility,
                    }
                }
                GfxPipelineResourceKind::Texture => {
                    srv_register += 1;
                    NativeRootParameter::SrvDescriptorTable {
                        base_register: srv_register - 1,
                        count: 1,
                        visibility: resource.visibility,
                    }
                }
            })
            .collect_vec();

        let static_samplers = if srv_register > 0 {
            vec![NativeStaticSampler {
                register: 0,
                visibility: ShaderVisibility::Pixel,
            }]
        } else {
            vec![]
        };

        NativeRootSignatureDesc {
            parameters,
            static_samplers,
            allow_input_layout: true,
        }
    }
}

// getters
impl GfxPipelineSignature {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn inputs(&self) -> &[GfxInputElement] {
        &self.inputs
    }

    #[inline]
    pub fn resources(&self) -> &[GfxPipelineResource] {
        &self.resources
    }

    #[inline]
    pub fn input_layout(&self) -> &[NativeInputElement] {
        &self.input_layout
    }

    /// 一个顶点的字节数
    #[inline]
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    #[inline]
    pub fn texture_count(&self) -> u32 {
        self.resources.iter().filter(|resource| resource.kind == GfxPipelineResourceKind::Texture).count() as u32
    }

    #[inline]
    pub(crate) fn core(&self) -> &Rc<GfxDeviceCore> {
        &self.core
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    pub fn root_signature(&self) -> GfxResult<RootSignatureHandle> {
        self.lifecycle.ensure_alive()?;
        self.root_signature.get_or_try_create(|| {
            let driver = self.core.driver();
            let desc = self.build_root_signature_desc();
            let root_signature =
                driver.create_root_signature(self.core.device()?, &desc).or_external("CreateRootSignature")?;
            log::info!(
                "create root signature {}: {:?}, {} parameters",
                self.name,
                root_signature,
                desc.parameters.len()
            );
            Ok(NativeRef::attach(driver, root_signature))
        })
    }
}

// destroy
impl GfxPipelineSignature {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        self.root_signature.release();
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxPipelineSignature {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::null_core;

    fn resources() -> Vec<GfxPipelineResource> {
        vec![
            GfxPipelineResource::new(GfxPipelineResourceKind::ConstantBuffer, ShaderVisibility::Vertex),
            GfxPipelineResource::new(GfxPipelineResourceKind::Texture, ShaderVisibility::Pixel),
            GfxPipelineResource::new(GfxPipelineResourceKind::ConstantBuffer, ShaderVisibility::All),
            GfxPipelineResource::new(GfxPipelineResourceKind::Texture, ShaderVisibility::Pixel),
        ]
    }

    #[test]
    fn test_input_layout_offsets() {
        let (_null, core) = null_core();
        let signature = GfxPipelineSignature::new(
            &core,
            vec![
                GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float),
                GfxInputElement::new(GfxInputSemantic::TexCoord, GfxFormat::R32G32Float),
                GfxInputElement::new(GfxInputSemantic::Color, GfxFormat::R32G32B32A32Float),
                GfxInputElement::new(GfxInputSemantic::TexCoord, GfxFormat::R32G32Float),
            ],
            vec![],
            "layout",
        )
        .unwrap();

        let layout = signature.input_layout();
        assert_eq!(layout.iter().map(|e| e.aligned_byte_offset).collect_vec(), vec![0, 12, 20, 36]);
        assert_eq!(layout.iter().map(|e| e.semantic_index).collect_vec(), vec![0, 0, 0, 1]);
        assert_eq!(layout[2].semantic_name, "COLOR");
        assert_eq!(signature.vertex_stride(), 44);
    }

    #[test]
    fn test_root_parameters_registers() {
        let (_null, core) = null_core();
        let inputs = vec![GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float)];
        let signature = GfxPipelineSignature::new(&core, inputs, resources(), "sig").unwrap();

        let desc = signature.build_root_signature_desc();
        assert_eq!(
            desc.parameters,
            vec![
                NativeRootParameter::ConstantBufferView {
                    register: 0,
                    visibility: ShaderVisibility::Vertex
                },
                NativeRootParameter::SrvDescriptorTable {
                    base_register: 0,
                    count: 1,
                    visibility: ShaderVisibility::Pixel
                },
                NativeRootParameter::ConstantBufferView {
                    register: 1,
                    visibility: ShaderVisibility::All
                },
                NativeRootParameter::SrvDescriptorTable {
                    base_register: 1,
                    count: 1,
                    visibility: ShaderVisibility::Pixel
                },
            ]
        );
        assert_eq!(desc.static_samplers.len(), 1);
        assert_eq!(signature.texture_count(), 2);
    }

    #[test]
    fn test_root_signature_is_lazy() {
        let (null, core) = null_core();
        let inputs = vec![GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float)];
        let signature = GfxPipelineSignature::new(&core, inputs, vec![], "sig").unwrap();
        assert!(signature.build_root_signature_desc().static_samplers.is_empty());
        assert_eq!(null.call_count("CreateRootSignature"), 0);

        let first = signature.root_signature().unwrap();
        assert_eq!(signature.root_signature().unwrap(), first);
        assert_eq!(null.call_count("CreateRootSignature"), 1);

        signature.dispose();
        assert!(matches!(signature.root_signature(), Err(GfxError::Disposed { .. })));
    }

    #[test]
    fn test_invalid_inputs() {
        let (_null, core) = null_core();
        assert!(GfxPipelineSignature::new(&core, vec![], vec![], "empty").is_err());
        let unknown = vec![GfxInputElement::new(GfxInputSemantic::Normal, GfxFormat::Unknown)];
        assert!(GfxPipelineSignature::new(&core, unknown, vec![], "unknown").is_err());
    }
}
