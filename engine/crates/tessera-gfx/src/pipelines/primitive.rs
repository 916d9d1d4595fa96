use std::rc::Rc;

use itertools::Itertools;

use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::native::{DescriptorHeapHandle, GpuDescriptor, NativeDescriptorHeapKind, NativeRef};
use crate::pipelines::pipeline::GfxPipeline;
use crate::pipelines::pipeline_signature::GfxPipelineResourceKind;
use crate::resources::resource::GfxResource;
use crate::resources::views::{GfxBufferView, GfxResourceBinding};

/// root CBV 的 GPU 地址需要 256 字节对齐
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// 一次 draw 需要的全部输入：pipeline、顶点、可选的索引以及输入资源
///
/// 输入资源在创建时与 pipeline signature 逐个校验；
/// 有 texture 输入时，shader visible 的 descriptor heap 在第一次 draw 时创建
pub struct GfxPrimitive {
    pipeline: Rc<GfxPipeline>,
    vertices: GfxBufferView,
    indices: Option<GfxBufferView>,
    bindings: Vec<GfxResourceBinding>,

    srv_heap: LazyNative<DescriptorHeapHandle>,
    lifecycle: GfxLifecycle,
    name: String,
}

// new & init
impl GfxPrimitive {
    pub fn new(
        pipeline: Rc<GfxPipeline>,
        vertices: GfxBufferView,
        indices: Option<GfxBufferView>,
        bindings: Vec<GfxResourceBinding>,
        name: impl Into<String>,
    ) -> GfxResult<Self> {
        let signature = pipeline.signature();
        signature.core().ensure_alive()?;

        if vertices.stride() != signature.vertex_stride() {
            return Err(GfxError::invalid_argument(
                "vertices",
                format!("vertex stride {} does not match signature stride {}", vertices.stride(), signature.vertex_stride()),
            ));
        }
        if bindings.len() != signature.resources().len() {
            return Err(GfxError::invalid_argument(
                "bindings",
                format!("expected {} input resources, got {}", signature.resources().len(), bindings.len()),
            ));
        }
        for (index, (binding, resource)) in bindings.iter().zip(signature.resources()).enumerate() {
            match (binding, resource.kind) {
                (GfxResourceBinding::Buffer(view), GfxPipelineResourceKind::ConstantBuffer) => {
                    if view.offset() % CONSTANT_BUFFER_ALIGNMENT != 0 {
                        return Err(GfxError::invalid_argument(
                            "bindings",
                            format!("constant buffer {index} offset {} is not 256-byte aligned", view.offset()),
                        ));
                    }
                }
                (GfxResourceBinding::Texture(_), GfxPipelineResourceKind::Texture) => (),
                (_, expected) => {
                    return Err(GfxError::invalid_argument(
                        "bindings",
                        format!("input resource {index} should be a {expected:?}"),
                    ));
                }
            }
        }

        Ok(Self {
            pipeline,
            vertices,
            indices,
            bindings,
            srv_heap: LazyNative::new(),
            lifecycle: GfxLifecycle::new("GfxPrimitive"),
            name: name.into(),
        })
    }
}

// getters
impl GfxPrimitive {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pipeline(&self) -> &Rc<GfxPipeline> {
        &self.pipeline
    }

    #[inline]
    pub fn vertices(&self) -> &GfxBufferView {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> Option<&GfxBufferView> {
        self.indices.as_ref()
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxResourceBinding] {
        &self.bindings
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.element_count()
    }

    #[inline]
    pub fn ensure_alive(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// 没有 texture 输入时返回 None
    pub fn descriptor_heap(&self) -> GfxResult<Option<DescriptorHeapHandle>> {
        self.lifecycle.ensure_alive()?;
        let textures = self
            .bindings
            .iter()
            .filter_map(|binding| match binding {
                GfxResourceBinding::Texture(texture) => Some(texture),
                GfxResourceBinding::Buffer(_) => None,
            })
            .collect_vec();
        if textures.is_empty() {
            return Ok(None);
        }

        let heap = self.srv_heap.get_or_try_create(|| {
            let core = self.pipeline.signature().core();
            let driver = core.driver();
            let device = core.device()?;
            let heap = driver
                .create_descriptor_heap(device, NativeDescriptorHeapKind::CbvSrvUav, textures.len() as u32, true)
                .or_external("CreateDescriptorHeap")?;
            let heap = NativeRef::attach(driver, heap);

            let increment = driver.descriptor_increment_size(device, NativeDescriptorHeapKind::CbvSrvUav);
            let start = driver.descriptor_heap_cpu_start(heap.handle());
            for (slot, texture) in textures.iter().enumerate() {
                let resource = texture.native_resource()?;
                driver.create_shader_resource_view(
                    device,
                    resource,
                    &texture.srv_desc(),
                    start.offset(slot as u32, increment),
                );
            }
            log::debug!("create srv heap for {}: {} textures", self.name, textures.len());
            Ok(heap)
        })?;
        Ok(Some(heap))
    }

    /// 第 `slot` 个 texture 输入在 shader visible heap 中的位置
    pub fn texture_descriptor(&self, slot: u32) -> GfxResult<GpuDescriptor> {
        let Some(heap) = self.descriptor_heap()? else {
            return Err(GfxError::invalid_argument("slot", format!("{} has no texture inputs", self.name)));
        };
        let core = self.pipeline.signature().core();
        let increment = core.driver().descriptor_increment_size(core.device()?, NativeDescriptorHeapKind::CbvSrvUav);
        Ok(core.driver().descriptor_heap_gpu_start(heap).offset(slot, increment))
    }
}

// destroy
impl GfxPrimitive {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        self.srv_heap.release();
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxPrimitive {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::device_core::GfxDeviceCore;
    use crate::native::{GfxFormat, ShaderVisibility};
    use crate::pipelines::pipeline_signature::{
        GfxInputElement, GfxInputSemantic, GfxPipelineResource, GfxPipelineSignature,
    };
    use crate::pipelines::shader::{GfxShader, GfxShaderKind};
    use crate::resources::buffer::GfxBuffer;
    use crate::resources::resource_state::{GfxBufferKind, GfxCpuAccess, GfxTextureKind};
    use crate::resources::texture::GfxTexture;
    use crate::test_utils::null_core;

    fn pipeline(core: &Rc<GfxDeviceCore>, resources: Vec<GfxPipelineResource>) -> Rc<GfxPipeline> {
        let inputs = vec![GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float)];
        let signature = Rc::new(GfxPipelineSignature::new(core, inputs, resources, "sig").unwrap());
        let vs = GfxShader::new(GfxShaderKind::Vertex, vec![1], "main").unwrap();
        Rc::new(GfxPipeline::new(signature, vs, None, "pso").unwrap())
    }

    fn vertices(core: &Rc<GfxDeviceCore>) -> GfxBufferView {
        let buffer = GfxBuffer::new(core, GfxBufferKind::Vertex, GfxCpuAccess::None, 36, 12, "vb").unwrap();
        GfxBufferView::whole(Rc::new(buffer)).unwrap()
    }

    fn texture(core: &Rc<GfxDeviceCore>) -> Rc<GfxTexture> {
        Rc::new(
            GfxTexture::new(
                core,
                GfxTextureKind::TwoDimensional,
                GfxCpuAccess::None,
                2,
                2,
                1,
                GfxFormat::R8G8B8A8Unorm,
                "tex",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_bindings_checked_against_signature() {
        let (_null, core) = null_core();
        let pipeline = pipeline(
            &core,
            vec![GfxPipelineResource::new(GfxPipelineResourceKind::Texture, ShaderVisibility::Pixel)],
        );

        assert!(GfxPrimitive::new(pipeline.clone(), vertices(&core), None, vec![], "missing").is_err());

        let cb = GfxBuffer::new(&core, GfxBufferKind::Constant, GfxCpuAccess::Write, 256, 0, "cb").unwrap();
        let wrong = vec![GfxResourceBinding::Buffer(GfxBufferView::whole(Rc::new(cb)).unwrap())];
        assert!(GfxPrimitive::new(pipeline.clone(), vertices(&core), None, wrong, "wrong").is_err());

        let right = vec![GfxResourceBinding::Texture(texture(&core))];
        let primitive = GfxPrimitive::new(pipeline, vertices(&core), None, right, "right").unwrap();
        assert_eq!(primitive.vertex_count(), 3);
    }

    #[test]
    fn test_vertex_stride_checked() {
        let (_null, core) = null_core();
        let buffer = GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 32, 16, "vb").unwrap();
        let view = GfxBufferView::whole(Rc::new(buffer)).unwrap();
        assert!(GfxPrimitive::new(pipeline(&core, vec![]), view, None, vec![], "bad").is_err());
    }

    #[test]
    fn test_descriptor_heap_has_one_srv_per_texture() {
        let (null, core) = null_core();
        let visibility = ShaderVisibility::Pixel;
        let pipeline = pipeline(
            &core,
            vec![
                GfxPipelineResource::new(GfxPipelineResourceKind::Texture, visibility),
                GfxPipelineResource::new(GfxPipelineResourceKind::Texture, visibility),
            ],
        );
        let bindings = vec![GfxResourceBinding::Texture(texture(&core)), GfxResourceBinding::Texture(texture(&core))];
        let primitive = GfxPrimitive::new(pipeline, vertices(&core), None, bindings, "textured").unwrap();
        assert_eq!(null.call_count("CreateDescriptorHeap"), 0);

        let heap = primitive.descriptor_heap().unwrap();
        assert!(heap.is_some());
        assert_eq!(primitive.descriptor_heap().unwrap(), heap);
        assert_eq!(null.call_count("CreateDescriptorHeap"), 1);
        assert_eq!(null.call_count("CreateShaderResourceView"), 2);
        assert_ne!(primitive.texture_descriptor(0).unwrap(), primitive.texture_descriptor(1).unwrap());
    }

    #[test]
    fn test_no_heap_without_textures() {
        let (null, core) = null_core();
        let primitive = GfxPrimitive::new(pipeline(&core, vec![]), vertices(&core), None, vec![], "plain").unwrap();
        assert_eq!(primitive.descriptor_heap().unwrap(), None);
        assert!(primitive.texture_descriptor(0).is_err());
        assert_eq!(null.call_count("CreateDescriptorHeap"), 0);
    }
}
