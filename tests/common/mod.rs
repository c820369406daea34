//! Shared fixtures for the HAL integration tests.
//!
//! Everything runs on the GL-family backend over a [`RecordingDriver`], so
//! tests can assert exactly which native calls a command sequence produced
//! without any GPU present.

use std::sync::Arc;

use prism_gfx::{
    BufferInfo, BufferUsage, BufferView, CallLog, ColorAttachmentDesc, Device,
    DeviceDescriptor, DynamicOffsetPolicy, Format, Framebuffer, IndexFormat, InputAssembler,
    PipelineState, PipelineStateInfo, PrimitiveTopology, Rect, RecordingDriver, RenderPass,
    RenderPassInfo, Shader, ShaderInfo, ShaderStage, ShaderStageFlags, TextureInfo, TextureUsage,
    TextureView, UniformBlock, UniformSampler, VertexAttribute,
};

pub const TARGET_SIZE: u32 = 64;

/// A device over a recording driver plus the handle to its call log.
pub struct TestContext {
    pub device: Arc<Device>,
    pub log: CallLog,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_driver(RecordingDriver::new(), DynamicOffsetPolicy::default())
    }

    pub fn without_vao() -> Self {
        Self::with_driver(RecordingDriver::without_vao(), DynamicOffsetPolicy::default())
    }

    pub fn with_policy(policy: DynamicOffsetPolicy) -> Self {
        Self::with_driver(RecordingDriver::new(), policy)
    }

    fn with_driver(driver: RecordingDriver, policy: DynamicOffsetPolicy) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = driver.log();
        let device = Device::new(
            DeviceDescriptor::gles(Box::new(driver)).with_dynamic_offset_policy(policy),
        )
        .expect("gles device creation cannot fail");
        Self { device, log }
    }

    /// Color-only pass plus a matching 64x64 framebuffer.
    pub fn color_target(&self) -> (Arc<RenderPass>, Arc<Framebuffer>) {
        let pass = self
            .device
            .create_render_pass(
                RenderPassInfo::new("color-pass")
                    .with_color(ColorAttachmentDesc::new(Format::Rgba8Unorm)),
            )
            .expect("valid render pass");
        let texture = self
            .device
            .create_texture(TextureInfo::new_2d(
                Format::Rgba8Unorm,
                TARGET_SIZE,
                TARGET_SIZE,
                TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            ))
            .expect("valid texture");
        let framebuffer = self
            .device
            .create_framebuffer(pass.clone(), vec![TextureView::whole(texture)], None)
            .expect("valid framebuffer");
        (pass, framebuffer)
    }

    pub fn render_area(&self) -> Rect {
        Rect::new(0, 0, TARGET_SIZE, TARGET_SIZE)
    }

    /// Shader with one position input and no descriptors.
    pub fn plain_shader(&self) -> Arc<Shader> {
        self.device
            .create_shader(
                ShaderInfo::new("plain")
                    .with_stage(ShaderStage::new(ShaderStageFlags::VERTEX, b"void main(){}".as_slice()))
                    .with_stage(ShaderStage::new(ShaderStageFlags::FRAGMENT, b"void main(){}".as_slice()))
                    .with_attribute(VertexAttribute::new("a_position", Format::Rg32Float, 0)),
            )
            .expect("valid shader")
    }

    /// Pipeline over [`Self::plain_shader`] with an empty layout.
    pub fn plain_pipeline(
        &self,
        render_pass: &Arc<RenderPass>,
        topology: PrimitiveTopology,
    ) -> Arc<PipelineState> {
        let shader = self.plain_shader();
        let layout = self.device.create_pipeline_layout(Vec::new());
        self.device
            .create_pipeline_state(
                PipelineStateInfo::new(shader, layout, render_pass.clone())
                    .with_topology(topology),
            )
            .expect("valid pipeline")
    }

    /// Six vertices of two floats each, no index buffer.
    pub fn vertex_ia(&self, shader_attrs: &[VertexAttribute]) -> Arc<InputAssembler> {
        let vertex_buffer = self
            .device
            .create_buffer(BufferInfo::new(48, BufferUsage::VERTEX).with_stride(8))
            .expect("valid buffer");
        self.device
            .create_input_assembler(
                shader_attrs.to_vec(),
                vec![BufferView::whole(vertex_buffer)],
                None,
                IndexFormat::Uint16,
            )
            .expect("valid input assembler")
    }

    /// Same vertices plus nine 16-bit indices.
    pub fn indexed_ia(&self, shader_attrs: &[VertexAttribute]) -> Arc<InputAssembler> {
        let vertex_buffer = self
            .device
            .create_buffer(BufferInfo::new(48, BufferUsage::VERTEX).with_stride(8))
            .expect("valid buffer");
        let index_buffer = self
            .device
            .create_buffer(BufferInfo::new(18, BufferUsage::INDEX))
            .expect("valid buffer");
        self.device
            .create_input_assembler(
                shader_attrs.to_vec(),
                vec![BufferView::whole(vertex_buffer)],
                Some(BufferView::whole(index_buffer)),
                IndexFormat::Uint16,
            )
            .expect("valid input assembler")
    }
}

pub fn position_attr() -> Vec<VertexAttribute> {
    vec![VertexAttribute::new("a_position", Format::Rg32Float, 0)]
}

/// Shader reflecting one uniform block and one combined sampler, both in
/// set 0.
pub fn material_shader(ctx: &TestContext) -> Arc<Shader> {
    ctx.device
        .create_shader(
            ShaderInfo::new("material")
                .with_stage(ShaderStage::new(ShaderStageFlags::VERTEX, b"void main(){}".as_slice()))
                .with_stage(ShaderStage::new(ShaderStageFlags::FRAGMENT, b"void main(){}".as_slice()))
                .with_attribute(VertexAttribute::new("a_position", Format::Rg32Float, 0))
                .with_block(UniformBlock {
                    name: "Globals".to_owned(),
                    set: 0,
                    binding: 0,
                    size: 64,
                    stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
                })
                .with_sampler(UniformSampler {
                    name: "u_albedo".to_owned(),
                    set: 0,
                    binding: 1,
                    count: 1,
                    stages: ShaderStageFlags::FRAGMENT,
                }),
        )
        .expect("valid shader")
}

/// Count how many draw calls (arrays or elements) the log holds.
pub fn draw_call_count(log: &CallLog) -> usize {
    log.count_calls(|c| {
        matches!(
            c,
            prism_gfx::GlesCall::DrawArrays { .. } | prism_gfx::GlesCall::DrawElements { .. }
        )
    })
}
