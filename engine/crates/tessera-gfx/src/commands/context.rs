use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::basic::color::GfxColor;
use crate::basic::lazy::LazyNative;
use crate::basic::lifecycle::GfxLifecycle;
use crate::commands::barrier::GfxResourceBarrier;
use crate::commands::fence::GfxFence;
use crate::error::{GfxError, GfxResult, NativeResultExt};
use crate::foundation::device_core::GfxDeviceCore;
use crate::native::{
    CommandAllocatorHandle, CommandListHandle, CpuDescriptor, GfxRect, GfxViewport, NativeCommand, NativeRef,
    NativeResourceBarrier, PrimitiveTopology, ResourceHandle, ResourceState,
};
use crate::pipelines::primitive::GfxPrimitive;
use crate::resources::buffer::GfxBuffer;
use crate::resources::resource::GfxResource;
use crate::resources::resource_state::GfxCpuAccess;
use crate::resources::texture::GfxTexture;
use crate::resources::views::GfxResourceBinding;

/// command list 的录制状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxCommandListState {
    Closed,
    Recording,
    /// 正在录制，并且 back buffer 处于 RENDER_TARGET 状态
    Drawing,
}

impl GfxCommandListState {
    pub fn as_str(self) -> &'static str {
        match self {
            GfxCommandListState::Closed => "closed",
            GfxCommandListState::Recording => "recording",
            GfxCommandListState::Drawing => "drawing",
        }
    }
}

/// 一个 back buffer 对应一个 context
///
/// - command allocator 和 command list 在第一次 `begin_frame` 时创建
/// - render target（第 `index` 个 back buffer）及其 RTV 在第一次 `begin_drawing` 时获取
/// - `frame_fence` 由 device 在 present 之后 signal，下次 `begin_frame` 时等待
/// - `execute_fence` 用于 `end_frame` 等待 command list 执行完毕
///
/// # Destroy
/// drop 时自动 dispose
pub struct GfxContext {
    core: Rc<GfxDeviceCore>,
    index: u32,

    allocator: LazyNative<CommandAllocatorHandle>,
    list: LazyNative<CommandListHandle>,
    state: Cell<GfxCommandListState>,

    frame_fence: GfxFence,
    execute_fence: GfxFence,

    render_target: RefCell<Option<NativeRef<ResourceHandle>>>,
    rtv: Cell<Option<CpuDescriptor>>,

    lifecycle: GfxLifecycle,
}

// new & init
impl GfxContext {
    pub fn new(core: &Rc<GfxDeviceCore>, index: u32) -> Self {
        Self {
            core: core.clone(),
            index,
            allocator: LazyNative::new(),
            list: LazyNative::new(),
            state: Cell::new(GfxCommandListState::Closed),
            frame_fence: GfxFence::new(core, format!("context-{index}-frame")),
            execute_fence: GfxFence::new(core, format!("context-{index}-execute")),
            render_target: RefCell::new(None),
            rtv: Cell::new(None),
            lifecycle: GfxLifecycle::new("GfxContext"),
        }
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn state(&self) -> GfxCommandListState {
        self.state.get()
    }

    #[inline]
    pub fn frame_fence(&self) -> &GfxFence {
        &self.frame_fence
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    #[inline]
    pub fn has_render_target(&self) -> bool {
        self.render_target.borrow().is_some()
    }

    fn native_allocator(&self) -> GfxResult<CommandAllocatorHandle> {
        self.allocator.get_or_try_create(|| {
            let driver = self.core.driver();
            let allocator = driver.create_command_allocator(self.core.device()?).or_external("CreateCommandAllocator")?;
            log::debug!("create command allocator for context {}: {:?}", self.index, allocator);
            Ok(NativeRef::attach(driver, allocator))
        })
    }

    /// 创建出来的 command list 处于 closed 状态
    pub fn native_command_list(&self) -> GfxResult<CommandListHandle> {
        self.lifecycle.ensure_alive()?;
        let allocator = self.native_allocator()?;
        self.list.get_or_try_create(|| {
            let driver = self.core.driver();
            let list = driver.create_command_list(self.core.device()?, allocator).or_external("CreateCommandList")?;
            log::debug!("create command list for context {}: {:?}", self.index, list);
            Ok(NativeRef::attach(driver, list))
        })
    }

    /// 第一次访问时获取 back buffer 并在 RTV heap 中创建 view
    fn render_target(&self) -> GfxResult<(ResourceHandle, CpuDescriptor)> {
        if let (Some(render_target), Some(rtv)) = (self.render_target.borrow().as_ref(), self.rtv.get()) {
            return Ok((render_target.handle(), rtv));
        }

        let buffer = self.core.swapchain()?.buffer(self.index)?;
        let rtv = self.core.rtv_descriptor(self.index)?;
        self.core.driver().create_render_target_view(self.core.device()?, buffer.handle(), rtv);

        let handle = buffer.handle();
        *self.render_target.borrow_mut() = Some(buffer);
        self.rtv.set(Some(rtv));
        Ok((handle, rtv))
    }
}

// tools
impl GfxContext {
    fn expect_state(&self, expected: GfxCommandListState) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        let actual = self.state.get();
        if actual != expected {
            return Err(GfxError::InvalidState {
                object: "GfxContext",
                expected: expected.as_str(),
                actual: actual.as_str(),
            });
        }
        Ok(())
    }

    /// 录制中（包括 drawing）才能录制命令
    fn expect_recording(&self) -> GfxResult<()> {
        self.lifecycle.ensure_alive()?;
        match self.state.get() {
            GfxCommandListState::Recording | GfxCommandListState::Drawing => Ok(()),
            GfxCommandListState::Closed => Err(GfxError::InvalidState {
                object: "GfxContext",
                expected: "recording",
                actual: "closed",
            }),
        }
    }

    fn record(&self, commands: impl IntoIterator<Item = NativeCommand>) -> GfxResult<()> {
        let list = self.native_command_list()?;
        let driver = self.core.driver();
        for command in commands {
            log::trace!("context {} record {}", self.index, command.name());
            driver.record_command(list, command);
        }
        Ok(())
    }

    /// 跳过 before == after 的 barrier，全部跳过时不录制任何命令
    fn barriers(barriers: impl IntoIterator<Item = GfxResourceBarrier>) -> Option<NativeCommand> {
        let barriers: Vec<NativeResourceBarrier> =
            barriers.into_iter().filter(|barrier| !barrier.is_noop()).map(Into::into).collect();
        if barriers.is_empty() { None } else { Some(NativeCommand::ResourceBarrier(barriers)) }
    }

    /// 只有 GPU 独占的资源需要转换状态，upload / readback 资源的状态固定
    fn copy_barrier(resource: &impl GfxResource, handle: ResourceHandle, copy_state: ResourceState) -> GfxResourceBarrier {
        let barrier = GfxResourceBarrier::new(handle);
        if resource.cpu_access() == GfxCpuAccess::None {
            barrier.transition(resource.default_state(), copy_state)
        } else {
            barrier.transition(resource.default_state(), resource.default_state())
        }
    }
}

// update
impl GfxContext {
    /// 等待这个 context 上一帧的 GPU 工作完成，然后重置 allocator 和 command list
    pub fn begin_frame(&self) -> GfxResult<()> {
        self.expect_state(GfxCommandListState::Closed)?;

        self.frame_fence.wait()?;
        self.frame_fence.reset()?;

        let allocator = self.native_allocator()?;
        let list = self.native_command_list()?;
        let driver = self.core.driver();
        driver.reset_command_allocator(allocator).or_external("ID3D12CommandAllocator::Reset")?;
        driver.reset_command_list(list, allocator, None).or_external("ID3D12GraphicsCommandList::Reset")?;

        self.state.set(GfxCommandListState::Recording);
        Ok(())
    }

    /// back buffer 转换为 render target，设置视口并清屏
    pub fn begin_drawing(&self, clear_color: GfxColor) -> GfxResult<()> {
        self.expect_state(GfxCommandListState::Recording)?;
        let (render_target, rtv) = self.render_target()?;

        let extent = self.core.surface_extent();
        let commands = [
            NativeCommand::ResourceBarrier(vec![
                GfxResourceBarrier::new(render_target)
                    .transition(ResourceState::PRESENT, ResourceState::RENDER_TARGET)
                    .into(),
            ]),
            NativeCommand::SetRenderTargets { rtv },
            NativeCommand::SetViewport(GfxViewport::covering(extent)),
            NativeCommand::SetScissorRect(GfxRect::covering(extent)),
            NativeCommand::ClearRenderTargetView {
                rtv,
                color: clear_color,
            },
            NativeCommand::SetPrimitiveTopology(PrimitiveTopology::TriangleList),
        ];
        self.record(commands)?;

        self.state.set(GfxCommandListState::Drawing);
        Ok(())
    }

    /// 所有参数都在录制之前校验，失败时不会录制任何命令
    pub fn draw(&self, primitive: &GfxPrimitive) -> GfxResult<()> {
        self.expect_state(GfxCommandListState::Drawing)?;
        primitive.ensure_alive()?;

        let pipeline = primitive.pipeline();
        let mut commands = vec![
            NativeCommand::SetGraphicsRootSignature(pipeline.signature().root_signature()?),
            NativeCommand::SetPipelineState(pipeline.pipeline_state()?),
        ];
        if let Some(heap) = primitive.descriptor_heap()? {
            commands.push(NativeCommand::SetDescriptorHeaps(vec![heap]));
        }
        commands.push(NativeCommand::SetVertexBuffers {
            start_slot: 0,
            views: vec![primitive.vertices().vertex_buffer_view()?],
        });

        let mut texture_slot = 0;
        for (root_index, binding) in primitive.bindings().iter().enumerate() {
            let root_index = root_index as u32;
            match binding {
                GfxResourceBinding::Buffer(view) => {
                    commands.push(NativeCommand::SetGraphicsRootConstantBufferView {
                        root_index,
                        gpu_address: view.gpu_address()?,
                    });
                }
                GfxResourceBinding::Texture(_) => {
                    commands.push(NativeCommand::SetGraphicsRootDescriptorTable {
                        root_index,
                        base: primitive.texture_descriptor(texture_slot)?,
                    });
                    texture_slot += 1;
                }
            }
        }

        match primitive.indices() {
            Some(indices) => {
                commands.push(NativeCommand::SetIndexBuffer(indices.index_buffer_view()?));
                commands.push(NativeCommand::DrawIndexedInstanced {
                    index_count: indices.element_count(),
                    instance_count: 1,
                    start_index: 0,
                    base_vertex: 0,
                    start_instance: 0,
                });
            }
            None => {
                commands.push(NativeCommand::DrawInstanced {
                    vertex_count: primitive.vertex_count(),
                    instance_count: 1,
                    start_vertex: 0,
                    start_instance: 0,
                });
            }
        }
        self.record(commands)
    }

    /// 把 `src` 的全部内容拷贝到 `dst` 的开头
    pub fn copy_buffer(&self, dst: &GfxBuffer, src: &GfxBuffer) -> GfxResult<()> {
        self.expect_recording()?;
        if dst.size() < src.size() {
            return Err(GfxError::invalid_argument(
                "dst",
                format!("{} ({} bytes) cannot hold {} ({} bytes)", dst.name(), dst.size(), src.name(), src.size()),
            ));
        }
        let dst_handle = dst.native_resource()?;
        let src_handle = src.native_resource()?;

        let to_copy = [
            Self::copy_barrier(dst, dst_handle, ResourceState::COPY_DEST),
            Self::copy_barrier(src, src_handle, ResourceState::COPY_SOURCE),
        ];
        let copy = NativeCommand::CopyBufferRegion {
            dst: dst_handle,
            dst_offset: 0,
            src: src_handle,
            src_offset: 0,
            size: src.size(),
        };
        let commands = Self::barriers(to_copy)
            .into_iter()
            .chain(Some(copy))
            .chain(Self::barriers(to_copy.map(GfxResourceBarrier::reversed)));
        self.record(commands)
    }

    /// `src` 中的数据需要按照 `dst.footprint()` 的布局排列
    pub fn copy_texture(&self, dst: &GfxTexture, src: &GfxBuffer) -> GfxResult<()> {
        self.expect_recording()?;
        let footprint = dst.footprint()?;
        if src.size() < footprint.offset + footprint.total_bytes() {
            return Err(GfxError::invalid_argument(
                "src",
                format!(
                    "{} ({} bytes) is smaller than the footprint of {} ({} bytes)",
                    src.name(),
                    src.size(),
                    dst.name(),
                    footprint.total_bytes()
                ),
            ));
        }
        let dst_handle = dst.native_resource()?;
        let src_handle = src.native_resource()?;

        let to_copy = [
            Self::copy_barrier(dst, dst_handle, ResourceState::COPY_DEST),
            Self::copy_barrier(src, src_handle, ResourceState::COPY_SOURCE),
        ];
        let copy = NativeCommand::CopyTextureRegion {
            dst: dst_handle,
            src: src_handle,
            footprint,
        };
        let commands = Self::barriers(to_copy)
            .into_iter()
            .chain(Some(copy))
            .chain(Self::barriers(to_copy.map(GfxResourceBarrier::reversed)));
        self.record(commands)
    }

    /// back buffer 转换回 PRESENT
    pub fn end_drawing(&self) -> GfxResult<()> {
        self.expect_state(GfxCommandListState::Drawing)?;
        let (render_target, _) = self.render_target()?;
        self.record([NativeCommand::ResourceBarrier(vec![
            GfxResourceBarrier::new(render_target)
                .transition(ResourceState::RENDER_TARGET, ResourceState::PRESENT)
                .into(),
        ])])?;
        self.state.set(GfxCommandListState::Recording);
        Ok(())
    }

    /// 关闭并提交 command list，然后阻塞等待执行完毕
    pub fn end_frame(&self) -> GfxResult<()> {
        self.expect_state(GfxCommandListState::Recording)?;

        let list = self.native_command_list()?;
        let driver = self.core.driver();
        driver.close_command_list(list).or_external("Close")?;
        self.state.set(GfxCommandListState::Closed);

        let queue = self.core.queue()?;
        driver.execute_command_lists(queue, &[list]);

        // 先推进目标值再 signal，保证等待的是这一次提交
        self.execute_fence.reset()?;
        self.execute_fence.signal(queue)?;
        self.execute_fence.wait()
    }

    /// 释放 back buffer 的引用，下次 `begin_drawing` 时重新获取
    pub fn on_surface_resized(&self) {
        if self.render_target.borrow_mut().take().is_some() {
            log::debug!("context {} released its render target", self.index);
        }
        self.rtv.set(None);
    }
}

// destroy
impl GfxContext {
    pub fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        if self.state.get() != GfxCommandListState::Closed {
            log::warn!("context {} disposed while {}", self.index, self.state.get().as_str());
        }
        self.on_surface_resized();
        self.list.release();
        self.allocator.release();
        self.frame_fence.dispose();
        self.execute_fence.dispose();
        self.lifecycle.end_dispose();
    }
}
impl Drop for GfxContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::native::{GfxFormat, NativeHandle};
    use crate::pipelines::pipeline::GfxPipeline;
    use crate::pipelines::pipeline_signature::{GfxInputElement, GfxInputSemantic, GfxPipelineSignature};
    use crate::pipelines::shader::{GfxShader, GfxShaderKind};
    use crate::resources::resource_state::GfxBufferKind;
    use crate::resources::views::GfxBufferView;
    use crate::test_utils::null_core;

    fn primitive(core: &Rc<GfxDeviceCore>, index_stride: Option<u32>) -> GfxPrimitive {
        let inputs = vec![GfxInputElement::new(GfxInputSemantic::Position, GfxFormat::R32G32B32Float)];
        let signature = Rc::new(GfxPipelineSignature::new(core, inputs, vec![], "sig").unwrap());
        let vs = GfxShader::new(GfxShaderKind::Vertex, vec![1], "main").unwrap();
        let pipeline = Rc::new(GfxPipeline::new(signature, vs, None, "pso").unwrap());

        let vb = GfxBuffer::new(core, GfxBufferKind::Vertex, GfxCpuAccess::None, 36, 12, "vb").unwrap();
        let indices = index_stride.map(|stride| {
            let ib = GfxBuffer::new(core, GfxBufferKind::Index, GfxCpuAccess::None, 24, stride, "ib").unwrap();
            GfxBufferView::whole(Rc::new(ib)).unwrap()
        });
        GfxPrimitive::new(pipeline, GfxBufferView::whole(Rc::new(vb)).unwrap(), indices, vec![], "triangle").unwrap()
    }

    #[test]
    fn test_begin_end_frame_resets_and_closes_once() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);

        for frame in 1..=3 {
            context.begin_frame().unwrap();
            assert_eq!(context.state(), GfxCommandListState::Recording);
            context.end_frame().unwrap();
            // present 之后由 device signal
            context.frame_fence().signal(core.queue().unwrap()).unwrap();

            let stats = null.command_list_stats(context.native_command_list().unwrap()).unwrap();
            assert_eq!(stats.reset_count, frame);
            assert_eq!(stats.close_count, frame);
            assert!(!stats.is_open);
        }
        assert!(null.validation_errors().is_empty());
    }

    #[test]
    fn test_state_checks() {
        let (_null, core) = null_core();
        let context = GfxContext::new(&core, 0);

        assert!(matches!(context.end_frame(), Err(GfxError::InvalidState { actual: "closed", .. })));
        assert!(matches!(context.begin_drawing(GfxColor::BLACK), Err(GfxError::InvalidState { .. })));

        context.begin_frame().unwrap();
        assert!(matches!(context.begin_frame(), Err(GfxError::InvalidState { actual: "recording", .. })));
        assert!(matches!(context.end_drawing(), Err(GfxError::InvalidState { .. })));

        context.begin_drawing(GfxColor::BLACK).unwrap();
        assert!(matches!(context.end_frame(), Err(GfxError::InvalidState { actual: "drawing", .. })));
        context.end_drawing().unwrap();
        context.end_frame().unwrap();
    }

    #[test]
    fn test_drawing_transitions_back_buffer() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);

        context.begin_frame().unwrap();
        context.begin_drawing(GfxColor::CORNFLOWER_BLUE).unwrap();
        context.draw(&primitive(&core, None)).unwrap();
        context.end_drawing().unwrap();

        let names = null
            .recorded_commands(context.native_command_list().unwrap())
            .iter()
            .map(NativeCommand::name)
            .collect_vec();
        assert_eq!(names.first(), Some(&"ResourceBarrier"));
        assert_eq!(names.last(), Some(&"ResourceBarrier"));
        assert!(names.contains(&"ClearRenderTargetView"));
        assert!(names.contains(&"DrawInstanced"));

        context.end_frame().unwrap();
        assert_eq!(null.executed_draw_count(), 1);
        assert!(null.validation_errors().is_empty());
        assert!(context.has_render_target());
    }

    #[test]
    fn test_indexed_draw_and_bad_stride() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);
        context.begin_frame().unwrap();
        context.begin_drawing(GfxColor::BLACK).unwrap();
        let list = context.native_command_list().unwrap();

        context.draw(&primitive(&core, Some(2))).unwrap();
        let indexed = null.recorded_commands(list).into_iter().find_map(|command| match command {
            NativeCommand::SetIndexBuffer(view) => Some(view.format),
            _ => None,
        });
        assert_eq!(indexed, Some(GfxFormat::R16Uint));
        assert_eq!(null.call_count("DrawIndexedInstanced"), 1);

        let before = null.recorded_commands(list).len();
        let err = context.draw(&primitive(&core, Some(8))).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument { name: "stride", .. }));
        assert_eq!(null.recorded_commands(list).len(), before);
    }

    #[test]
    fn test_copy_round_trip() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);
        let data = [1u32, 2, 3, 4, 5, 6, 7, 8];

        let upload = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, 32, 0, "upload").unwrap();
        let gpu = GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 32, 4, "gpu").unwrap();
        let readback = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Read, 32, 0, "readback").unwrap();
        upload.write_data(0, &data).unwrap();

        context.begin_frame().unwrap();
        context.copy_buffer(&gpu, &upload).unwrap();
        context.copy_buffer(&readback, &gpu).unwrap();
        context.end_frame().unwrap();

        assert_eq!(readback.read_data::<u32>(0, 8).unwrap(), data.to_vec());
        assert_eq!(null.resource_state(gpu.native_resource().unwrap()), Some(ResourceState::VERTEX_AND_CONSTANT_BUFFER));
        assert!(null.validation_errors().is_empty());
    }

    #[test]
    fn test_copy_texture() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);
        let texture = GfxTexture::new(
            &core,
            crate::resources::resource_state::GfxTextureKind::TwoDimensional,
            GfxCpuAccess::None,
            2,
            2,
            1,
            GfxFormat::R8G8B8A8Unorm,
            "tex",
        )
        .unwrap();
        let total = texture.footprint().unwrap().total_bytes();
        let small = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, 16, 0, "small").unwrap();
        let upload = GfxBuffer::new(&core, GfxBufferKind::Default, GfxCpuAccess::Write, total, 0, "upload").unwrap();

        context.begin_frame().unwrap();
        assert!(context.copy_texture(&texture, &small).is_err());
        context.copy_texture(&texture, &upload).unwrap();
        context.end_frame().unwrap();

        assert_eq!(null.call_count("CopyTextureRegion"), 1);
        assert!(null.validation_errors().is_empty());
    }

    #[test]
    fn test_resize_releases_render_target() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 1);
        context.begin_frame().unwrap();
        context.begin_drawing(GfxColor::BLACK).unwrap();
        context.end_drawing().unwrap();
        context.end_frame().unwrap();

        let swapchain = core.swapchain().unwrap();
        let buffer = swapchain.buffer(1).unwrap();
        assert_eq!(null.ref_count(buffer.handle().raw()), Some(3));

        context.on_surface_resized();
        assert!(!context.has_render_target());
        assert_eq!(null.ref_count(buffer.handle().raw()), Some(2));
    }

    #[test]
    fn test_dispose() {
        let (null, core) = null_core();
        let context = GfxContext::new(&core, 0);
        context.begin_frame().unwrap();
        context.end_frame().unwrap();
        let list = context.native_command_list().unwrap();

        context.dispose();
        assert_eq!(null.ref_count(list.raw()), None);
        assert!(matches!(context.begin_frame(), Err(GfxError::Disposed { object: "GfxContext" })));
        context.dispose();
    }
}
