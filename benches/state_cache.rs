use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prism_gfx::{
    BufferInfo, BufferUsage, BufferView, CallLog, ColorAttachmentDesc, CommandBufferKind,
    DescriptorSetLayoutBinding, DescriptorType, Device, DeviceDescriptor, Format, IndexFormat,
    Framebuffer, InputAssembler, PipelineState, PipelineStateInfo, Rect, RecordingDriver,
    RenderPassInfo, ShaderInfo, ShaderStage, ShaderStageFlags, TextureInfo, TextureUsage,
    TextureView, VertexAttribute,
};

struct Scene {
    device: Arc<Device>,
    log: CallLog,
    framebuffer: Arc<Framebuffer>,
    pipeline: Arc<PipelineState>,
    assembler: Arc<InputAssembler>,
}

fn build_scene() -> Scene {
    let driver = RecordingDriver::new();
    let log = driver.log();
    let device = Device::new(DeviceDescriptor::gles(Box::new(driver))).unwrap();

    let pass = device
        .create_render_pass(
            RenderPassInfo::new("bench-pass").with_color(ColorAttachmentDesc::new(Format::Rgba8Unorm)),
        )
        .unwrap();
    let target = device
        .create_texture(TextureInfo::new_2d(
            Format::Rgba8Unorm,
            256,
            256,
            TextureUsage::COLOR_ATTACHMENT,
        ))
        .unwrap();
    let framebuffer = device
        .create_framebuffer(pass.clone(), vec![TextureView::whole(target)], None)
        .unwrap();

    let shader = device
        .create_shader(
            ShaderInfo::new("bench-shader")
                .with_stage(ShaderStage::new(
                    ShaderStageFlags::VERTEX,
                    b"void main(){}".as_slice(),
                ))
                .with_stage(ShaderStage::new(
                    ShaderStageFlags::FRAGMENT,
                    b"void main(){}".as_slice(),
                ))
                .with_attribute(VertexAttribute::new("a_position", Format::Rg32Float, 0)),
        )
        .unwrap();
    let layout = device.create_pipeline_layout(Vec::new());
    let pipeline = device
        .create_pipeline_state(PipelineStateInfo::new(shader, layout, pass))
        .unwrap();

    let vertices = device
        .create_buffer(BufferInfo::new(8 * 1024, BufferUsage::VERTEX).with_stride(8))
        .unwrap();
    let indices = device
        .create_buffer(BufferInfo::new(2 * 3 * 256, BufferUsage::INDEX).with_stride(2))
        .unwrap();
    let assembler = device
        .create_input_assembler(
            vec![VertexAttribute::new("a_position", Format::Rg32Float, 0)],
            vec![BufferView::whole(vertices)],
            Some(BufferView::whole(indices)),
            IndexFormat::Uint16,
        )
        .unwrap();

    Scene {
        device,
        log,
        framebuffer,
        pipeline,
        assembler,
    }
}

// ---------------------------------------------------------------------------
// State cache hit path
// ---------------------------------------------------------------------------

fn bench_redundant_binds(c: &mut Criterion) {
    let scene = build_scene();
    let mut cb = scene
        .device
        .create_command_buffer(CommandBufferKind::Primary)
        .unwrap();
    cb.begin();
    cb.begin_render_pass(&scene.framebuffer, Rect::new(0, 0, 256, 256), &[]);
    cb.bind_pipeline_state(&scene.pipeline);
    cb.bind_input_assembler(&scene.assembler);
    cb.draw();

    c.bench_function("bind_draw_fully_cached", |b| {
        b.iter(|| {
            cb.bind_pipeline_state(black_box(&scene.pipeline));
            cb.bind_input_assembler(black_box(&scene.assembler));
            cb.draw();
            scene.log.clear_calls();
        });
    });
}

fn bench_descriptor_rebind(c: &mut Criterion) {
    let scene = build_scene();
    let set_layout = scene
        .device
        .create_descriptor_set_layout(vec![DescriptorSetLayoutBinding::new(
            0,
            DescriptorType::UniformBuffer,
            ShaderStageFlags::VERTEX,
        )])
        .unwrap();
    let set = scene.device.create_descriptor_set(&set_layout).unwrap();
    let uniforms = scene
        .device
        .create_buffer(BufferInfo::new(256, BufferUsage::UNIFORM))
        .unwrap();
    set.bind_buffer(0, BufferView::whole(uniforms));
    set.update(&scene.device);

    let mut cb = scene
        .device
        .create_command_buffer(CommandBufferKind::Primary)
        .unwrap();
    cb.begin();
    cb.begin_render_pass(&scene.framebuffer, Rect::new(0, 0, 256, 256), &[]);
    cb.bind_pipeline_state(&scene.pipeline);
    cb.bind_input_assembler(&scene.assembler);

    c.bench_function("descriptor_set_rebind_cached", |b| {
        b.iter(|| {
            cb.bind_descriptor_set(0, black_box(&set), &[]);
            cb.draw();
            scene.log.clear_calls();
        });
    });
}

// ---------------------------------------------------------------------------
// Resource creation
// ---------------------------------------------------------------------------

fn bench_create_buffer(c: &mut Criterion) {
    let scene = build_scene();

    c.bench_function("create_buffer_1kb", |b| {
        b.iter(|| {
            black_box(
                scene
                    .device
                    .create_buffer(BufferInfo::new(1024, BufferUsage::VERTEX))
                    .unwrap(),
            );
            scene.log.clear_calls();
        });
    });
}

criterion_group!(
    benches,
    bench_redundant_binds,
    bench_descriptor_rebind,
    bench_create_buffer,
);
criterion_main!(benches);
