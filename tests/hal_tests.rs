//! Integration tests for the HAL frontend over the recording GL driver.
//!
//! Covered here:
//!
//! - **State cache**: redundant binds produce zero native state calls
//! - **Descriptor sets**: the dirty bit clears on update and re-arms on
//!   writes and buffer resizes; unbound slots fall back to placeholders
//! - **Command buffers**: render-pass scoping, draw counters, secondary
//!   deferral and replay, and the pending-until-fence discipline
//! - **Queue**: the per-buffer semaphore chain, depart, and sync-object
//!   reclamation
//! - **Dynamic offsets**: both resolution policies, end to end

mod common;

use rstest::rstest;

use common::{draw_call_count, material_shader, position_attr, TestContext};
use prism_gfx::{
    BufferInfo, BufferUsage, BufferView, CommandBufferKind, DescriptorSetLayoutBinding,
    DescriptorType, DrawInfo, DynamicOffsetPolicy, GlesCall, GlesCapabilities,
    PipelineStateInfo, PrimitiveTopology, SemaphoreId, ShaderStageFlags, Viewport,
};

// ============================================================================
// State Cache
// ============================================================================

#[test]
fn redundant_binds_produce_no_state_calls() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.vertex_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.set_viewport(Viewport::new(0, 0, 64, 64));
    cb.draw();

    ctx.log.clear_calls();

    // Identical state again: the cache must swallow everything but the draw.
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.set_viewport(Viewport::new(0, 0, 64, 64));
    cb.draw();

    assert_eq!(ctx.log.state_call_count(), 0);
    assert_eq!(draw_call_count(&ctx.log), 1);

    cb.end_render_pass();
    cb.end();
}

#[test]
fn pipeline_change_reapplies_differing_state() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let list = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let strip = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleStrip);
    let ia = ctx.vertex_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&list);
    cb.bind_input_assembler(&ia);
    cb.draw();

    ctx.log.clear_calls();
    cb.bind_pipeline_state(&strip);
    // Different program, so at least UseProgram must go out.
    assert!(ctx.log.count_calls(|c| matches!(c, GlesCall::UseProgram(_))) > 0);

    cb.end_render_pass();
    cb.end();
}

#[test]
fn vao_is_built_once_per_pipeline_and_assembler() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.vertex_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    assert_eq!(
        ctx.log.count_calls(|c| matches!(c, GlesCall::CreateVertexArray(_))),
        1
    );
}

#[test]
fn no_vao_capability_uses_attribute_pointers() {
    let ctx = TestContext::without_vao();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.vertex_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    assert_eq!(
        ctx.log.count_calls(|c| matches!(c, GlesCall::CreateVertexArray(_))),
        0
    );
    assert!(ctx.log.count_calls(|c| matches!(c, GlesCall::VertexAttribPointer { .. })) > 0);
    assert!(ctx.log.count_calls(|c| matches!(c, GlesCall::EnableVertexAttrib(_))) > 0);
}

// ============================================================================
// Descriptor Sets
// ============================================================================

fn material_fixture(
    ctx: &TestContext,
) -> (
    std::sync::Arc<prism_gfx::PipelineState>,
    std::sync::Arc<prism_gfx::DescriptorSet>,
    std::sync::Arc<prism_gfx::Buffer>,
    std::sync::Arc<prism_gfx::Framebuffer>,
) {
    let (pass, framebuffer) = ctx.color_target();
    let shader = material_shader(ctx);
    let set_layout = ctx
        .device
        .create_descriptor_set_layout(vec![
            DescriptorSetLayoutBinding::new(
                0,
                DescriptorType::UniformBuffer,
                ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
            ),
            DescriptorSetLayoutBinding::new(
                1,
                DescriptorType::CombinedSampledTexture,
                ShaderStageFlags::FRAGMENT,
            ),
        ])
        .unwrap();
    let layout = ctx.device.create_pipeline_layout(vec![set_layout.clone()]);
    let pipeline = ctx
        .device
        .create_pipeline_state(PipelineStateInfo::new(shader, layout, pass))
        .unwrap();
    let set = ctx.device.create_descriptor_set(&set_layout).unwrap();
    let uniforms = ctx
        .device
        .create_buffer(BufferInfo::new(256, BufferUsage::UNIFORM))
        .unwrap();
    (pipeline, set, uniforms, framebuffer)
}

#[test]
fn update_clears_dirty_and_second_update_is_free() {
    let ctx = TestContext::new();
    let (_, set, uniforms, _) = material_fixture(&ctx);

    assert!(!set.is_dirty());
    set.bind_buffer(0, BufferView::whole(uniforms));
    assert!(set.is_dirty());

    assert_eq!(set.update(&ctx.device), 1);
    assert!(!set.is_dirty());
    assert_eq!(set.update(&ctx.device), 0);
}

#[test]
fn buffer_resize_re_dirties_referencing_sets() {
    let ctx = TestContext::new();
    let (_, set, uniforms, _) = material_fixture(&ctx);

    set.bind_buffer(0, BufferView::whole(uniforms.clone()));
    set.update(&ctx.device);
    assert!(!set.is_dirty());

    ctx.device.resize_buffer(&uniforms, 512).unwrap();
    assert_eq!(uniforms.size(), 512);
    assert!(set.is_dirty());
}

#[test]
fn resize_reallocates_native_storage() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(BufferInfo::new(64, BufferUsage::VERTEX).with_stride(8))
        .unwrap();
    assert_eq!(buffer.count(), 8);

    ctx.log.clear_calls();
    ctx.device.resize_buffer(&buffer, 128).unwrap();
    assert_eq!(buffer.size(), 128);
    assert_eq!(buffer.count(), 16);
    assert_eq!(
        ctx.log.count_calls(|c| matches!(c, GlesCall::BufferData { size: 128, .. })),
        1
    );
}

#[test]
fn unbound_slots_fall_back_to_placeholders() {
    let ctx = TestContext::new();
    let (pipeline, set, _uniforms, framebuffer) = material_fixture(&ctx);
    let ia = ctx.vertex_ia(&position_attr());

    // Device defaults are created first, so they own the first native
    // handles: buffer 1, texture 2, sampler 3.
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_descriptor_set(0, &set, &[]);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    assert!(
        ctx.log
            .count_calls(|c| matches!(c, GlesCall::BindBufferRange { handle: 1, .. }))
            > 0,
        "unbound uniform block must bind the placeholder buffer"
    );
    assert!(
        ctx.log
            .count_calls(|c| matches!(c, GlesCall::BindTextureUnit { handle: 2, .. }))
            > 0,
        "unbound sampler must bind the placeholder texture"
    );
}

#[test]
fn clean_rebind_of_same_set_is_cached() {
    let ctx = TestContext::new();
    let (pipeline, set, uniforms, framebuffer) = material_fixture(&ctx);
    let ia = ctx.vertex_ia(&position_attr());

    set.bind_buffer(0, BufferView::whole(uniforms));
    set.update(&ctx.device);

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_descriptor_set(0, &set, &[]);
    cb.bind_input_assembler(&ia);
    cb.draw();

    ctx.log.clear_calls();
    cb.bind_descriptor_set(0, &set, &[]);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    assert_eq!(
        ctx.log.count_calls(|c| matches!(c, GlesCall::BindBufferRange { .. })),
        0,
        "identical uniform binding must hit the shadow state"
    );
}

// ============================================================================
// Render-Pass Scoping and Counters
// ============================================================================

#[test]
fn draw_outside_render_pass_is_skipped() {
    let ctx = TestContext::new();
    let (pass, _framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.vertex_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end();

    assert_eq!(draw_call_count(&ctx.log), 0);
    assert_eq!(cb.stats().draw_calls, 0);
    assert_eq!(cb.stats().triangles, 0);
}

#[test]
fn buffer_upload_inside_render_pass_is_rejected() {
    let ctx = TestContext::new();
    let (_pass, framebuffer) = ctx.color_target();
    let buffer = ctx
        .device
        .create_buffer(BufferInfo::new(64, BufferUsage::UNIFORM))
        .unwrap();

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.update_buffer(&buffer, 0, &[0u8; 16]);
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);

    ctx.log.clear_calls();
    cb.update_buffer(&buffer, 0, &[0u8; 16]);
    assert_eq!(
        ctx.log.count_calls(|c| matches!(c, GlesCall::BufferSubData { .. })),
        0
    );

    cb.end_render_pass();
    cb.end();
}

#[rstest]
#[case::list(PrimitiveTopology::TriangleList, 3)]
#[case::strip(PrimitiveTopology::TriangleStrip, 7)]
#[case::fan(PrimitiveTopology::TriangleFan, 7)]
fn nine_indices_count_triangles_by_topology(
    #[case] topology: PrimitiveTopology,
    #[case] expected: u64,
) {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, topology);
    let ia = ctx.indexed_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    assert_eq!(cb.stats().draw_calls, 1);
    assert_eq!(cb.stats().triangles, expected);
}

#[test]
fn instancing_scales_triangle_and_instance_counters() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.indexed_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_input_assembler(&ia);
    cb.draw_with(DrawInfo::indexed(9).with_instances(4));
    cb.end_render_pass();
    cb.end();

    assert_eq!(cb.stats().draw_calls, 1);
    assert_eq!(cb.stats().instances, 4);
    assert_eq!(cb.stats().triangles, 12);
}

#[test]
fn executed_secondaries_fold_their_counters_into_the_primary() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.indexed_ia(&position_attr());

    let mut secondary = ctx
        .device
        .create_command_buffer(CommandBufferKind::Secondary)
        .unwrap();
    secondary.begin_secondary(&pass);
    secondary.bind_pipeline_state(&pipeline);
    secondary.bind_input_assembler(&ia);
    secondary.draw();
    secondary.draw();
    secondary.end();
    assert_eq!(secondary.stats().draw_calls, 2);

    let mut primary = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    primary.begin();
    primary.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    primary.execute(&[&secondary]);
    primary.end_render_pass();
    primary.end();

    assert_eq!(primary.stats().draw_calls, 2);
    assert_eq!(primary.stats().triangles, 6);
}

#[test]
fn secondary_draws_are_deferred_until_the_primary_replays_them() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.indexed_ia(&position_attr());

    let mut secondary = ctx
        .device
        .create_command_buffer(CommandBufferKind::Secondary)
        .unwrap();
    secondary.begin_secondary(&pass);
    secondary.bind_pipeline_state(&pipeline);
    secondary.bind_input_assembler(&ia);
    secondary.draw();
    secondary.end();
    assert_eq!(
        draw_call_count(&ctx.log),
        0,
        "recording a secondary must not reach the driver"
    );

    ctx.log.clear_calls();
    let mut primary = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    primary.begin();
    primary.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    primary.execute(&[&secondary]);
    assert_eq!(
        draw_call_count(&ctx.log),
        1,
        "execute replays the secondary inside the open pass"
    );
    primary.end_render_pass();
    primary.end();
}

#[test]
fn inline_draws_and_secondaries_cannot_share_a_pass() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.indexed_ia(&position_attr());

    let mut secondary = ctx
        .device
        .create_command_buffer(CommandBufferKind::Secondary)
        .unwrap();
    secondary.begin_secondary(&pass);
    secondary.bind_pipeline_state(&pipeline);
    secondary.bind_input_assembler(&ia);
    secondary.draw();
    secondary.end();

    // Execute first: the later inline draw is rejected.
    let mut primary = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    primary.begin();
    primary.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    primary.bind_pipeline_state(&pipeline);
    primary.bind_input_assembler(&ia);
    primary.execute(&[&secondary]);
    primary.draw();
    primary.end_render_pass();
    primary.end();
    assert_eq!(primary.stats().draw_calls, 1);

    // Draw first: the later execute is rejected.
    let mut other = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    other.begin();
    other.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    other.bind_pipeline_state(&pipeline);
    other.bind_input_assembler(&ia);
    other.draw();
    other.execute(&[&secondary]);
    other.end_render_pass();
    other.end();
    assert_eq!(other.stats().draw_calls, 1);
}

// ============================================================================
// Queue and Submission Chain
// ============================================================================

#[test]
fn submissions_chain_wait_on_the_previous_signal() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();

    cb.begin();
    cb.end();
    let first = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert_eq!(first.wait, None);
    assert!(first.fence.is_signaled());

    cb.begin();
    cb.end();
    let second = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert_eq!(second.wait, Some(first.signal));
    assert_eq!(ctx.device.queue().last_signal(), Some(second.signal));

    ctx.device.queue().depart();
    assert_eq!(ctx.device.queue().last_signal(), None);

    cb.begin();
    cb.end();
    let next_frame = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert_eq!(next_frame.wait, None);

    assert_eq!(ctx.device.queue().totals().submissions, 3);
}

#[test]
fn submitting_an_unfinished_command_buffer_fails() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    assert!(ctx.device.queue().submit(std::slice::from_mut(&mut cb)).is_err());
}

#[test]
fn queue_totals_accumulate_across_submissions() {
    let ctx = TestContext::new();
    let (pass, framebuffer) = ctx.color_target();
    let pipeline = ctx.plain_pipeline(&pass, PrimitiveTopology::TriangleList);
    let ia = ctx.indexed_ia(&position_attr());

    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    for _ in 0..2 {
        cb.begin();
        cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
        cb.bind_pipeline_state(&pipeline);
        cb.bind_input_assembler(&ia);
        cb.draw();
        cb.end_render_pass();
        cb.end();
        ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    }

    let totals = ctx.device.queue().totals();
    assert_eq!(totals.submissions, 2);
    assert_eq!(totals.draw_calls, 2);
    assert_eq!(totals.triangles, 6);
}

#[test]
fn batched_submissions_advance_the_chain_once_per_buffer() {
    let ctx = TestContext::new();
    let mut opener = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    opener.begin();
    opener.end();
    let first = ctx.device.queue().submit(std::slice::from_mut(&mut opener)).unwrap();
    assert_eq!(first.signal, SemaphoreId(0));

    let mut a = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    a.begin();
    a.end();
    let mut b = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    b.begin();
    b.end();
    let mut pair = [a, b];
    let batch = ctx.device.queue().submit(&mut pair).unwrap();
    assert_eq!(batch.wait, Some(first.signal));
    // Two links: the hop between the batch's buffers signals 1, the batch
    // itself signals 2.
    assert_eq!(batch.signal, SemaphoreId(2));

    opener.begin();
    opener.end();
    let next = ctx.device.queue().submit(std::slice::from_mut(&mut opener)).unwrap();
    assert_eq!(next.wait, Some(batch.signal));
}

#[test]
fn submitting_a_secondary_buffer_directly_fails() {
    let ctx = TestContext::new();
    let (pass, _framebuffer) = ctx.color_target();
    let mut secondary = ctx
        .device
        .create_command_buffer(CommandBufferKind::Secondary)
        .unwrap();
    secondary.begin_secondary(&pass);
    secondary.end();
    assert!(secondary.is_executable());
    assert!(ctx
        .device
        .queue()
        .submit(std::slice::from_mut(&mut secondary))
        .is_err());
}

#[test]
fn depart_returns_retired_fences_to_the_pool() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.end();
    let first = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    ctx.device.queue().depart();

    cb.begin();
    cb.end();
    let second = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert_eq!(second.fence.id(), first.fence.id());
}

#[test]
fn depart_keeps_sync_objects_while_the_gpu_is_behind() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.end();
    let first = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    // Pull the fence back to the in-flight state a real GPU would show.
    first.fence.reset();
    ctx.device.queue().depart();

    let mut other = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    other.begin();
    other.end();
    let second = ctx.device.queue().submit(std::slice::from_mut(&mut other)).unwrap();
    assert_eq!(second.wait, None, "depart still closes the frame");
    assert_ne!(
        second.fence.id(),
        first.fence.id(),
        "an unretired fence must not return to the pool"
    );
}

// ============================================================================
// Dynamic Offsets
// ============================================================================

/// Layout declares dynamic blocks at bindings 0 and 2; the shader's
/// reflection lists binding 2 first, so the two policies assign opposite
/// indices.
#[rstest]
#[case::first_match_wins(DynamicOffsetPolicy::FirstMatchWins, 200, 100)]
#[case::layout_order(DynamicOffsetPolicy::LayoutOrder, 100, 200)]
fn dynamic_offsets_follow_the_layout_policy(
    #[case] policy: DynamicOffsetPolicy,
    #[case] expected_b0: u64,
    #[case] expected_b2: u64,
) {
    use prism_gfx::{ShaderInfo, ShaderStage, UniformBlock, VertexAttribute};

    let ctx = TestContext::with_policy(policy);
    let (pass, framebuffer) = ctx.color_target();

    let shader = ctx
        .device
        .create_shader(
            ShaderInfo::new("two-blocks")
                .with_stage(ShaderStage::new(ShaderStageFlags::VERTEX, b"void main(){}".as_slice()))
                .with_attribute(VertexAttribute::new("a_position", prism_gfx::Format::Rg32Float, 0))
                .with_block(UniformBlock {
                    name: "PerDraw".to_owned(),
                    set: 0,
                    binding: 2,
                    size: 64,
                    stages: ShaderStageFlags::VERTEX,
                })
                .with_block(UniformBlock {
                    name: "PerFrame".to_owned(),
                    set: 0,
                    binding: 0,
                    size: 64,
                    stages: ShaderStageFlags::VERTEX,
                }),
        )
        .unwrap();

    let set_layout = ctx
        .device
        .create_descriptor_set_layout(vec![
            DescriptorSetLayoutBinding::new(
                0,
                DescriptorType::DynamicUniformBuffer,
                ShaderStageFlags::VERTEX,
            ),
            DescriptorSetLayoutBinding::new(
                2,
                DescriptorType::DynamicUniformBuffer,
                ShaderStageFlags::VERTEX,
            ),
        ])
        .unwrap();
    let layout = ctx.device.create_pipeline_layout(vec![set_layout.clone()]);
    let pipeline = ctx
        .device
        .create_pipeline_state(PipelineStateInfo::new(shader, layout, pass))
        .unwrap();

    let uniforms = ctx
        .device
        .create_buffer(BufferInfo::new(1024, BufferUsage::UNIFORM))
        .unwrap();
    let set = ctx.device.create_descriptor_set(&set_layout).unwrap();
    set.bind_buffer(0, prism_gfx::BufferView::new(uniforms.clone(), 0, 64).unwrap());
    set.bind_buffer_at(2, 0, prism_gfx::BufferView::new(uniforms.clone(), 0, 64).unwrap());
    set.update(&ctx.device);

    let ia = ctx.vertex_ia(&position_attr());
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.begin_render_pass(&framebuffer, ctx.render_area(), &[]);
    cb.bind_pipeline_state(&pipeline);
    cb.bind_descriptor_set(0, &set, &[100, 200]);
    cb.bind_input_assembler(&ia);
    cb.draw();
    cb.end_render_pass();
    cb.end();

    // The shader walks binding 2 first, then binding 0; native slots are
    // assigned in that walk order.
    let ranges: Vec<(u32, u64)> = ctx
        .log
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GlesCall::BindBufferRange { slot, offset, .. } => Some((slot, offset)),
            _ => None,
        })
        .collect();
    assert!(
        ranges.contains(&(0, expected_b2)),
        "binding 2 (native slot 0) got {ranges:?}, wanted offset {expected_b2}"
    );
    assert!(
        ranges.contains(&(1, expected_b0)),
        "binding 0 (native slot 1) got {ranges:?}, wanted offset {expected_b0}"
    );
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn default_capabilities_report_vaos() {
    let caps = GlesCapabilities::default();
    assert!(caps.vertex_array_objects);
    assert_eq!(caps.texture_units, 16);
}

#[test]
fn submitted_buffer_can_be_reused_after_its_fence_signals() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.end();
    let submission = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert!(submission.fence.is_signaled());

    // Synchronous backend: the fence is already signaled, so recording may
    // start again immediately.
    cb.begin();
    cb.end();
    assert!(cb.is_executable());
}

#[test]
fn begin_is_rejected_while_the_submission_fence_is_unsignaled() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.end();
    let submission = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();

    // Pull the fence back to the in-flight state a real GPU would show.
    submission.fence.reset();
    cb.begin();
    cb.end();
    assert!(
        !cb.is_executable(),
        "a pending buffer must refuse to record until its fence lands"
    );

    submission.fence.signal();
    cb.begin();
    cb.end();
    assert!(cb.is_executable());
}

#[test]
fn poll_fence_reports_submission_state() {
    let ctx = TestContext::new();
    let mut cb = ctx.device.create_command_buffer(CommandBufferKind::Primary).unwrap();
    cb.begin();
    cb.end();
    let submission = ctx.device.queue().submit(std::slice::from_mut(&mut cb)).unwrap();
    assert!(ctx.device.poll_fence(&submission.fence));

    submission.fence.reset();
    assert!(!ctx.device.poll_fence(&submission.fence));
}
