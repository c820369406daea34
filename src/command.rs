//! Command buffers.
//!
//! Recording follows a strict lifecycle: `begin`, optional render passes
//! with draws inside them, `end`, then submission through the queue. A
//! buffer handed to [`crate::Queue::submit`] stays pending until its fence
//! signals; beginning it again before then is rejected.
//!
//! Illegal calls are logged and dropped rather than panicking, and they
//! never touch the draw counters.

use std::sync::Arc;

use crate::descriptor::DescriptorSet;
use crate::device::{BackendRef, Device};
use crate::resources::{Buffer, Framebuffer, InputAssembler, PipelineState, RenderPass};
use crate::sync::Fence;
use crate::types::{Color, CommandBufferKind, DrawInfo, Rect, Viewport};

/// Maximum payload for an inline buffer update on Vulkan.
#[cfg(feature = "vulkan-backend")]
const INLINE_UPDATE_LIMIT: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Recording,
    InRenderPass,
    Executable,
    Pending,
}

/// How draws enter an open render pass. The first draw or execute decides,
/// and inline draws and executed secondaries cannot mix within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassContents {
    Unset,
    Inline,
    Secondaries,
}

/// Commands a GL-family secondary buffer holds until a primary replays them
/// inside its render pass.
#[derive(Debug)]
enum DeferredCommand {
    BindPipelineState(Arc<PipelineState>),
    BindDescriptorSet {
        set_index: u32,
        set: Arc<DescriptorSet>,
        dynamic_offsets: Vec<u64>,
    },
    BindInputAssembler(Arc<InputAssembler>),
    SetViewport(Viewport),
    SetScissor(Rect),
    Draw {
        input_assembler: Arc<InputAssembler>,
        info: DrawInfo,
    },
}

#[cfg(feature = "vulkan-backend")]
#[derive(Debug)]
struct PendingPass {
    framebuffer: Arc<Framebuffer>,
    render_area: Rect,
    clear_colors: Vec<Color>,
}

/// Counters accumulated while recording, reset by `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBufferStats {
    pub draw_calls: u32,
    pub instances: u32,
    pub triangles: u64,
}

#[derive(Debug)]
struct BoundSet {
    set: Arc<DescriptorSet>,
    dynamic_offsets: Vec<u64>,
    dirty: bool,
}

/// Records rendering commands for one queue submission.
#[derive(Debug)]
pub struct CommandBuffer {
    device: Arc<Device>,
    id: u64,
    kind: CommandBufferKind,
    state: State,
    stats: CommandBufferStats,
    pending_fence: Option<Fence>,
    pipeline: Option<Arc<PipelineState>>,
    input_assembler: Option<Arc<InputAssembler>>,
    ia_dirty: bool,
    bound_sets: Vec<Option<BoundSet>>,
    pass_contents: PassContents,
    deferred: Vec<DeferredCommand>,
    #[cfg(feature = "vulkan-backend")]
    pending_pass: Option<PendingPass>,
}

impl CommandBuffer {
    pub(crate) fn new(device: Arc<Device>, id: u64, kind: CommandBufferKind) -> Self {
        Self {
            device,
            id,
            kind,
            state: State::Initial,
            stats: CommandBufferStats::default(),
            pending_fence: None,
            pipeline: None,
            input_assembler: None,
            ia_dirty: false,
            bound_sets: Vec::new(),
            pass_contents: PassContents::Unset,
            deferred: Vec::new(),
            #[cfg(feature = "vulkan-backend")]
            pending_pass: None,
        }
    }

    pub fn kind(&self) -> CommandBufferKind {
        self.kind
    }

    pub fn stats(&self) -> CommandBufferStats {
        self.stats
    }

    pub fn is_executable(&self) -> bool {
        self.state == State::Executable
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn mark_pending(&mut self, fence: Fence) {
        self.state = State::Pending;
        self.pending_fence = Some(fence);
    }

    /// Start recording a primary command buffer.
    pub fn begin(&mut self) {
        if self.kind != CommandBufferKind::Primary {
            log::error!("begin: secondary buffers begin inside a render pass, use begin_secondary");
            return;
        }
        self.begin_inner(None);
    }

    /// Start recording a secondary buffer whose draws will execute inside a
    /// pass over `render_pass`.
    pub fn begin_secondary(&mut self, render_pass: &RenderPass) {
        if self.kind != CommandBufferKind::Secondary {
            log::error!("begin_secondary: called on a primary command buffer");
            return;
        }
        self.begin_inner(Some(render_pass));
    }

    fn begin_inner(&mut self, inherited_pass: Option<&RenderPass>) {
        if self.state == State::Pending {
            match &self.pending_fence {
                Some(fence) if !fence.is_signaled() => {
                    log::error!("begin: command buffer is still pending on the GPU");
                    return;
                }
                _ => self.pending_fence = None,
            }
        }
        if self.state == State::Recording || self.state == State::InRenderPass {
            log::error!("begin: already recording");
            return;
        }

        self.stats = CommandBufferStats::default();
        self.pipeline = None;
        self.input_assembler = None;
        self.ia_dirty = false;
        self.bound_sets.clear();
        self.pass_contents = PassContents::Unset;
        self.deferred.clear();
        #[cfg(feature = "vulkan-backend")]
        {
            self.pending_pass = None;
        }
        self.state = State::Recording;

        match self.device.backend() {
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                ctx.begin_command_buffer(self.id, self.kind, inherited_pass)
            }
        }
        #[cfg(not(feature = "vulkan-backend"))]
        let _ = inherited_pass;
    }

    /// Finish recording. The buffer becomes executable and can be submitted.
    pub fn end(&mut self) {
        if self.state == State::InRenderPass {
            log::error!("end: render pass still open");
            return;
        }
        if self.state != State::Recording {
            log::error!("end: not recording");
            return;
        }
        self.state = State::Executable;
        match self.device.backend() {
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.end_command_buffer(self.id),
        }
    }

    /// Open a render pass over `framebuffer`. `clear_colors` overrides the
    /// pass defaults per color attachment; missing entries fall back to the
    /// attachment description.
    pub fn begin_render_pass(
        &mut self,
        framebuffer: &Arc<Framebuffer>,
        render_area: Rect,
        clear_colors: &[Color],
    ) {
        if self.kind != CommandBufferKind::Primary {
            log::error!("begin_render_pass: secondary buffers inherit the pass");
            return;
        }
        if self.state != State::Recording {
            log::error!("begin_render_pass: not recording or pass already open");
            return;
        }
        self.state = State::InRenderPass;
        self.pass_contents = PassContents::Unset;
        match self.device.backend() {
            BackendRef::Gles(ctx) => {
                ctx.begin_render_pass(Some(framebuffer.as_ref()), render_area, clear_colors)
            }
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                let accesses = self.device.access_tracker().drain();
                ctx.cmd_flush_barriers(self.id, &accesses);
                // The native begin waits for the first draw or execute,
                // whose kind fixes the subpass contents.
                self.pending_pass = Some(PendingPass {
                    framebuffer: Arc::clone(framebuffer),
                    render_area,
                    clear_colors: clear_colors.to_vec(),
                });
            }
        }
    }

    pub fn end_render_pass(&mut self) {
        if self.state != State::InRenderPass {
            log::error!("end_render_pass: no pass open");
            return;
        }
        self.state = State::Recording;
        match self.device.backend() {
            BackendRef::Gles(ctx) => ctx.end_render_pass(),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                // A pass nobody drew into still clears; flush it inline.
                if let Some(pending) = self.pending_pass.take() {
                    ctx.cmd_begin_render_pass(
                        self.id,
                        &pending.framebuffer,
                        pending.render_area,
                        &pending.clear_colors,
                        false,
                    );
                }
                ctx.cmd_end_render_pass(self.id);
            }
        }
    }

    /// A pass's first draw or execute fixes its contents. On Vulkan the
    /// native pass begin is issued here, once the contents are known.
    fn claim_pass_contents(&mut self, wanted: PassContents) -> bool {
        match self.pass_contents {
            PassContents::Unset => {
                self.pass_contents = wanted;
                #[cfg(feature = "vulkan-backend")]
                if let Some(pending) = self.pending_pass.take() {
                    if let BackendRef::Vulkan(ctx) = self.device.backend() {
                        ctx.cmd_begin_render_pass(
                            self.id,
                            &pending.framebuffer,
                            pending.render_area,
                            &pending.clear_colors,
                            wanted == PassContents::Secondaries,
                        );
                    }
                }
                true
            }
            current => current == wanted,
        }
    }

    pub fn bind_pipeline_state(&mut self, pipeline: &Arc<PipelineState>) {
        if !self.recording() {
            log::error!("bind_pipeline_state: not recording");
            return;
        }
        // A new pipeline may remap descriptor bindings, so everything bound
        // so far must be re-applied at the next draw.
        for entry in self.bound_sets.iter_mut().flatten() {
            entry.dirty = true;
        }
        self.ia_dirty = true;
        self.pipeline = Some(Arc::clone(pipeline));
        if self.defers() {
            self.deferred
                .push(DeferredCommand::BindPipelineState(Arc::clone(pipeline)));
            return;
        }
        match self.device.backend() {
            BackendRef::Gles(ctx) => ctx.bind_pipeline_state(pipeline),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.cmd_bind_pipeline(self.id, pipeline),
        }
    }

    /// Bind a descriptor set to `set_index`. `dynamic_offsets` are ordered
    /// by the pipeline layout's [`crate::types::DynamicOffsetPolicy`]; the
    /// binding is applied lazily at the next draw.
    pub fn bind_descriptor_set(
        &mut self,
        set_index: u32,
        set: &Arc<DescriptorSet>,
        dynamic_offsets: &[u64],
    ) {
        if !self.recording() {
            log::error!("bind_descriptor_set: not recording");
            return;
        }
        let index = set_index as usize;
        if self.bound_sets.len() <= index {
            self.bound_sets.resize_with(index + 1, || None);
        }
        self.bound_sets[index] = Some(BoundSet {
            set: Arc::clone(set),
            dynamic_offsets: dynamic_offsets.to_vec(),
            dirty: true,
        });
    }

    pub fn bind_input_assembler(&mut self, ia: &Arc<InputAssembler>) {
        if !self.recording() {
            log::error!("bind_input_assembler: not recording");
            return;
        }
        self.input_assembler = Some(Arc::clone(ia));
        self.ia_dirty = true;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if !self.recording() {
            log::error!("set_viewport: not recording");
            return;
        }
        if self.defers() {
            self.deferred.push(DeferredCommand::SetViewport(viewport));
            return;
        }
        match self.device.backend() {
            BackendRef::Gles(ctx) => ctx.set_viewport(viewport),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.cmd_set_viewport(self.id, viewport),
        }
    }

    pub fn set_scissor(&mut self, scissor: Rect) {
        if !self.recording() {
            log::error!("set_scissor: not recording");
            return;
        }
        if self.defers() {
            self.deferred.push(DeferredCommand::SetScissor(scissor));
            return;
        }
        match self.device.backend() {
            BackendRef::Gles(ctx) => ctx.set_scissor(scissor),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.cmd_set_scissor(self.id, scissor),
        }
    }

    /// Draw with the input assembler's own draw info.
    pub fn draw(&mut self) {
        let Some(ia) = self.input_assembler.clone() else {
            log::error!("draw: no input assembler bound");
            return;
        };
        let info = ia.draw_info();
        self.draw_with(info);
    }

    /// Draw with explicit parameters, overriding the assembler's defaults.
    pub fn draw_with(&mut self, info: DrawInfo) {
        if !self.in_pass() {
            log::error!("draw: outside a render pass");
            return;
        }
        let Some(pipeline) = self.pipeline.clone() else {
            log::error!("draw: no pipeline bound");
            return;
        };
        let Some(ia) = self.input_assembler.clone() else {
            log::error!("draw: no input assembler bound");
            return;
        };
        if self.kind == CommandBufferKind::Primary
            && !self.claim_pass_contents(PassContents::Inline)
        {
            log::error!("draw: this render pass is executing secondary buffers");
            return;
        }

        self.flush_bindings(&pipeline, &ia);

        if self.defers() {
            self.deferred.push(DeferredCommand::Draw {
                input_assembler: Arc::clone(&ia),
                info,
            });
        } else {
            match self.device.backend() {
                BackendRef::Gles(ctx) => ctx.draw(&ia, &info),
                #[cfg(feature = "vulkan-backend")]
                BackendRef::Vulkan(ctx) => ctx.cmd_draw(self.id, &info),
            }
        }

        let vertices = if info.is_indexed() {
            info.index_count
        } else {
            info.vertex_count
        };
        let instances = info.instances();
        self.stats.draw_calls += 1;
        self.stats.instances += instances;
        self.stats.triangles +=
            pipeline.topology().triangle_count(vertices) as u64 * instances as u64;
    }

    /// Apply descriptor sets and the input assembler that changed since the
    /// last draw.
    fn flush_bindings(&mut self, pipeline: &Arc<PipelineState>, ia: &Arc<InputAssembler>) {
        let defers = self.defers();
        for (set_index, entry) in self.bound_sets.iter_mut().enumerate() {
            let Some(bound) = entry else { continue };
            if !bound.dirty {
                continue;
            }
            bound.dirty = false;
            if bound.set.is_dirty() {
                log::warn!(
                    "draw: descriptor set at index {set_index} has writes not yet pushed by update()"
                );
            }
            if defers {
                self.deferred.push(DeferredCommand::BindDescriptorSet {
                    set_index: set_index as u32,
                    set: Arc::clone(&bound.set),
                    dynamic_offsets: bound.dynamic_offsets.clone(),
                });
                continue;
            }
            match self.device.backend() {
                BackendRef::Gles(ctx) => ctx.bind_descriptor_set(
                    pipeline,
                    set_index as u32,
                    &bound.set,
                    &bound.dynamic_offsets,
                    self.device.defaults(),
                ),
                #[cfg(feature = "vulkan-backend")]
                BackendRef::Vulkan(ctx) => ctx.cmd_bind_descriptor_set(
                    self.id,
                    pipeline,
                    set_index as u32,
                    &bound.set,
                    &bound.dynamic_offsets,
                ),
            }
        }
        if self.ia_dirty {
            self.ia_dirty = false;
            if defers {
                self.deferred
                    .push(DeferredCommand::BindInputAssembler(Arc::clone(ia)));
                return;
            }
            match self.device.backend() {
                BackendRef::Gles(ctx) => ctx.bind_input_assembler(pipeline, ia),
                #[cfg(feature = "vulkan-backend")]
                BackendRef::Vulkan(ctx) => ctx.cmd_bind_input_assembler(self.id, ia),
            }
        }
    }

    /// Upload `data` into `buffer` as part of this submission. Only legal on
    /// primaries, outside a render pass.
    pub fn update_buffer(&mut self, buffer: &Arc<Buffer>, offset: u64, data: &[u8]) {
        if self.kind != CommandBufferKind::Primary {
            log::error!("update_buffer: not a primary command buffer");
            return;
        }
        if self.state != State::Recording {
            log::error!("update_buffer: uploads are not allowed inside a render pass");
            return;
        }
        let fits = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= buffer.size());
        if !fits {
            log::error!(
                "update_buffer: [{offset}, {offset}+{}) outside buffer of {} bytes",
                data.len(),
                buffer.size()
            );
            return;
        }
        match (buffer.gpu(), self.device.backend()) {
            (crate::backend::GpuBuffer::Gles(gles), BackendRef::Gles(ctx)) => {
                ctx.update_buffer(gles, offset, data)
            }
            #[cfg(feature = "vulkan-backend")]
            (crate::backend::GpuBuffer::Vulkan(vulkan), BackendRef::Vulkan(ctx)) => {
                if data.len() > INLINE_UPDATE_LIMIT || data.len() % 4 != 0 {
                    log::error!(
                        "update_buffer: inline updates must be <= {INLINE_UPDATE_LIMIT} bytes and 4-byte aligned, got {}",
                        data.len()
                    );
                    return;
                }
                ctx.cmd_update_buffer(self.id, vulkan, offset, data);
            }
            #[cfg(feature = "vulkan-backend")]
            _ => log::error!("update_buffer: buffer belongs to another device"),
        }
    }

    /// Replay executable secondary buffers inside the open render pass and
    /// fold their counters into this buffer's.
    pub fn execute(&mut self, secondaries: &[&CommandBuffer]) {
        if self.kind != CommandBufferKind::Primary {
            log::error!("execute: only primaries execute secondaries");
            return;
        }
        if self.state != State::InRenderPass {
            log::error!("execute: no render pass open");
            return;
        }
        if !self.claim_pass_contents(PassContents::Secondaries) {
            log::error!("execute: this render pass already has inline draws");
            return;
        }
        let mut accepted = Vec::with_capacity(secondaries.len());
        for secondary in secondaries {
            if secondary.kind != CommandBufferKind::Secondary || !secondary.is_executable() {
                log::error!("execute: skipping a buffer that is not an ended secondary");
                continue;
            }
            accepted.push(*secondary);
            self.stats.draw_calls += secondary.stats.draw_calls;
            self.stats.instances += secondary.stats.instances;
            self.stats.triangles += secondary.stats.triangles;
        }
        match self.device.backend() {
            // GL has no native secondary buffers; replay the commands the
            // secondary deferred into the open pass.
            BackendRef::Gles(ctx) => {
                for secondary in &accepted {
                    let mut current: Option<&Arc<PipelineState>> = None;
                    for command in &secondary.deferred {
                        match command {
                            DeferredCommand::BindPipelineState(pipeline) => {
                                current = Some(pipeline);
                                ctx.bind_pipeline_state(pipeline);
                            }
                            DeferredCommand::BindDescriptorSet {
                                set_index,
                                set,
                                dynamic_offsets,
                            } => {
                                if let Some(pipeline) = current {
                                    ctx.bind_descriptor_set(
                                        pipeline,
                                        *set_index,
                                        set,
                                        dynamic_offsets,
                                        self.device.defaults(),
                                    );
                                }
                            }
                            DeferredCommand::BindInputAssembler(ia) => {
                                if let Some(pipeline) = current {
                                    ctx.bind_input_assembler(pipeline, ia);
                                }
                            }
                            DeferredCommand::SetViewport(viewport) => ctx.set_viewport(*viewport),
                            DeferredCommand::SetScissor(scissor) => ctx.set_scissor(*scissor),
                            DeferredCommand::Draw {
                                input_assembler,
                                info,
                            } => ctx.draw(input_assembler, info),
                        }
                    }
                }
                // The replay replaced our bindings; re-apply at the next draw.
                for entry in self.bound_sets.iter_mut().flatten() {
                    entry.dirty = true;
                }
                self.ia_dirty = true;
                if let Some(pipeline) = &self.pipeline {
                    ctx.bind_pipeline_state(pipeline);
                }
            }
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                let ids: Vec<u64> = accepted.iter().map(|cb| cb.id).collect();
                ctx.cmd_execute(self.id, &ids);
            }
        }
    }

    fn recording(&self) -> bool {
        self.state == State::Recording || self.state == State::InRenderPass
    }

    /// GL-family secondaries have no native object to record into, so their
    /// commands are held for replay by [`CommandBuffer::execute`].
    fn defers(&self) -> bool {
        if self.kind != CommandBufferKind::Secondary {
            return false;
        }
        match self.device.backend() {
            BackendRef::Gles(_) => true,
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(_) => false,
        }
    }

    fn in_pass(&self) -> bool {
        match self.kind {
            CommandBufferKind::Primary => self.state == State::InRenderPass,
            // Secondaries record inside an inherited pass.
            CommandBufferKind::Secondary => self.state == State::Recording,
        }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        match self.device.backend() {
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.release_command_buffer(self.id),
        }
    }
}
