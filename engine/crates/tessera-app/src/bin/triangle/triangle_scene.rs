use std::rc::Rc;

use anyhow::Context;
use glam::{Vec3, Vec4};
use tessera_crate_tools::resource::TesseraPath;
use tessera_gfx::commands::context::GfxContext;
use tessera_gfx::error::GfxResult;
use tessera_gfx::foundation::device::GfxDevice;
use tessera_gfx::native::{GfxFormat, ShaderVisibility};
use tessera_gfx::pipelines::pipeline_signature::{
    GfxInputElement, GfxInputSemantic, GfxPipelineResource, GfxPipelineResourceKind,
};
use tessera_gfx::pipelines::primitive::GfxPrimitive;
use tessera_gfx::pipelines::shader::{GfxShader, GfxShaderKind};
use tessera_gfx::resources::buffer::GfxBuffer;
use tessera_gfx::resources::resource::GfxResource;
use tessera_gfx::resources::resource_state::{GfxBufferKind, GfxCpuAccess};
use tessera_gfx::resources::views::{GfxBufferView, GfxResourceBinding};

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }
}

/// 对应 shader 中的 `cbuffer Tint : register(b0)`
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TintConstants {
    tint: [f32; 4],
}

const VERTEX_STRIDE: u32 = size_of::<Vertex>() as u32;
const CONSTANT_BUFFER_SIZE: u64 = 256;

pub fn triangle_vertices() -> [Vertex; 3] {
    [
        Vertex::new(Vec3::new(0.0, 0.5, 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec4::new(0.0, 1.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

/// 读取 `shader/.build/` 下编译好的 shader，不存在时使用占位的字节码
///
/// 占位字节码只能用于 null driver
fn load_shader(device: &GfxDevice, kind: GfxShaderKind, name: &str) -> anyhow::Result<GfxShader> {
    let path = TesseraPath::shader_build_path(name);
    if path.exists() {
        return GfxShader::from_file(kind, &path, "main");
    }
    log::warn!("shader not found: {}, use placeholder bytecode", path.display());
    Ok(device.create_shader(kind, b"DXBC".to_vec(), "main")?)
}

/// 一个带顶点颜色和 tint constant buffer 的三角形
///
/// 顶点数据先写入 upload buffer，第一帧通过 `copy_buffer` 拷贝到 GPU 独占的 vertex buffer
pub struct TriangleScene {
    upload: Rc<GfxBuffer>,
    vertices: Rc<GfxBuffer>,
    constants: Rc<GfxBuffer>,
    primitive: GfxPrimitive,

    uploaded: bool,
    frame: u64,
}

// new & init
impl TriangleScene {
    pub fn new(device: &GfxDevice) -> anyhow::Result<Self> {
        let inputs = vec![
            GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float),
            GfxInputElement::new(GfxInputSemantic::Color, GfxFormat::R32G32B32A32Float),
        ];
        let resources = vec![GfxPipelineResource::new(GfxPipelineResourceKind::ConstantBuffer, ShaderVisibility::Vertex)];
        let signature = Rc::new(device.create_pipeline_signature(inputs, resources, "triangle-signature")?);

        let vs = load_shader(device, GfxShaderKind::Vertex, "triangle.vs")?;
        let ps = load_shader(device, GfxShaderKind::Pixel, "triangle.ps")?;
        let pipeline = Rc::new(device.create_pipeline(signature, vs, Some(ps), "triangle-pipeline")?);

        let triangle = triangle_vertices();
        let size = size_of_val(&triangle) as u64;
        let upload =
            Rc::new(device.create_buffer(GfxBufferKind::Vertex, GfxCpuAccess::Write, size, VERTEX_STRIDE, "triangle-upload")?);
        upload.write_data(0, &triangle).context("写入顶点数据失败")?;
        let vertices =
            Rc::new(device.create_buffer(GfxBufferKind::Vertex, GfxCpuAccess::None, size, VERTEX_STRIDE, "triangle-vertices")?);

        let constants = Rc::new(device.create_buffer(
            GfxBufferKind::Constant,
            GfxCpuAccess::Write,
            CONSTANT_BUFFER_SIZE,
            0,
            "triangle-tint",
        )?);

        let primitive = device.create_primitive(
            pipeline,
            GfxBufferView::whole(vertices.clone())?,
            None,
            vec![GfxResourceBinding::Buffer(GfxBufferView::whole(constants.clone())?)],
            "triangle",
        )?;

        Ok(Self {
            upload,
            vertices,
            constants,
            primitive,
            uploaded: false,
            frame: 0,
        })
    }
}

// update
impl TriangleScene {
    /// 第一帧录制顶点拷贝，之后每帧更新 tint
    pub fn prepare(&mut self, context: &GfxContext) -> GfxResult<()> {
        if !self.uploaded {
            context.copy_buffer(&self.vertices, &self.upload)?;
            self.uploaded = true;
            log::info!("triangle vertices uploaded");
        }

        let t = (self.frame % 120) as f32 / 119.0;
        let tint = Vec4::ONE.lerp(Vec4::new(1.0, 0.8, 0.6, 1.0), t);
        self.constants.write_data(0, &[TintConstants { tint: tint.to_array() }])?;
        self.frame += 1;
        Ok(())
    }

    pub fn draw(&self, context: &GfxContext) -> GfxResult<()> {
        context.draw(&self.primitive)
    }
}

#[cfg(test)]
mod tests {
    use tessera_crate_tools::init_log::init_test_log;
    use tessera_gfx::basic::color::GfxColor;
    use tessera_gfx::config::GfxConfig;
    use tessera_gfx::foundation::provider::GfxProvider;
    use tessera_gfx::native::null::NullDriver;
    use tessera_gfx::native::{GfxExtent2D, NativeCommand};
    use tessera_gfx::swapchain::surface::GfxSurface;

    use super::*;

    #[test]
    fn test_vertices_are_copied_once() {
        init_test_log();
        let null = Rc::new(NullDriver::new());
        let provider = GfxProvider::new(null.clone(), GfxConfig::default()).unwrap();
        let adapter = provider.adapters().unwrap().remove(0);
        let device = adapter.create_device(GfxSurface::headless(GfxExtent2D::new(32, 32)), GfxConfig::default()).unwrap();

        let mut scene = TriangleScene::new(&device).unwrap();
        assert_eq!(VERTEX_STRIDE, 28);

        for _ in 0..3 {
            let context = device.current_context().unwrap();
            context.begin_frame().unwrap();
            scene.prepare(&context).unwrap();
            let copies = null
                .recorded_commands(context.native_command_list().unwrap())
                .into_iter()
                .filter(|command| matches!(command, NativeCommand::CopyBufferRegion { .. }))
                .count();
            assert_eq!(copies, if scene.frame == 1 { 1 } else { 0 });

            context.begin_drawing(GfxColor::BLACK).unwrap();
            scene.draw(&context).unwrap();
            context.end_drawing().unwrap();
            context.end_frame().unwrap();
            device.present_frame().unwrap();
        }

        assert_eq!(null.executed_draw_count(), 3);
        assert_eq!(null.validation_errors(), Vec::<String>::new());
    }
}
