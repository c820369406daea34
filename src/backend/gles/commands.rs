//! Draw-state application with redundancy elimination.
//!
//! Every operation here diffs the requested state against the context's
//! [`super::cache::GlesStateCache`] and only reaches the driver on mismatch.
//! Binding a pipeline whose id matches the cached id short-circuits the
//! whole diff; pipeline states are immutable, so an id match proves the
//! entire derived native configuration already applies.

use crate::descriptor::DescriptorSet;
use crate::device::DeviceDefaults;
use crate::resources::{Framebuffer, InputAssembler, PipelineState};
use crate::types::{Color, ColorMask, LoadOp, Rect, StencilFace, StencilFaceState, Viewport};

use super::cache::UboBinding;
use super::driver::{BufferTarget, Capability};
use super::GlesContext;

impl GlesContext {
    pub(crate) fn bind_pipeline_state(&self, pipeline: &PipelineState) {
        let mut cache = self.cache.lock();
        if cache.pipeline_id == Some(pipeline.id()) {
            return;
        }

        let driver = self.driver();
        let Some(shader) = pipeline.shader().gpu().gles() else {
            return;
        };
        if cache.program != shader.program {
            driver.use_program(shader.program);
            cache.program = shader.program;
        }

        cache.topology = pipeline.topology();

        let rs = &pipeline.info().rasterizer;
        let cull_enabled = rs.cull_mode != crate::types::CullMode::None;
        if cache.cull_enabled != cull_enabled {
            driver.set_capability(Capability::CullFace, cull_enabled);
            cache.cull_enabled = cull_enabled;
        }
        if cull_enabled && cache.cull_mode != rs.cull_mode {
            driver.cull_face(rs.cull_mode);
            cache.cull_mode = rs.cull_mode;
        }
        if cache.front_face_ccw != rs.front_face_ccw {
            driver.front_face_ccw(rs.front_face_ccw);
            cache.front_face_ccw = rs.front_face_ccw;
        }
        let offset_enabled = rs.depth_bias != 0.0 || rs.depth_bias_slope != 0.0;
        if cache.polygon_offset_enabled != offset_enabled {
            driver.set_capability(Capability::PolygonOffsetFill, offset_enabled);
            cache.polygon_offset_enabled = offset_enabled;
        }
        if offset_enabled
            && (cache.depth_bias != rs.depth_bias || cache.depth_bias_slope != rs.depth_bias_slope)
        {
            driver.polygon_offset(rs.depth_bias, rs.depth_bias_slope);
            cache.depth_bias = rs.depth_bias;
            cache.depth_bias_slope = rs.depth_bias_slope;
        }
        if cache.line_width != rs.line_width {
            driver.line_width(rs.line_width);
            cache.line_width = rs.line_width;
        }

        let ds = &pipeline.info().depth_stencil;
        if cache.depth_test != ds.depth_test {
            driver.set_capability(Capability::DepthTest, ds.depth_test);
            cache.depth_test = ds.depth_test;
        }
        if cache.depth_write != ds.depth_write {
            driver.depth_mask(ds.depth_write);
            cache.depth_write = ds.depth_write;
        }
        if cache.depth_func != ds.depth_func {
            driver.depth_func(ds.depth_func);
            cache.depth_func = ds.depth_func;
        }

        let stencil_test = ds.front.test || ds.back.test;
        if cache.stencil_test != stencil_test {
            driver.set_capability(Capability::StencilTest, stencil_test);
            cache.stencil_test = stencil_test;
        }
        self.apply_stencil_face(&mut cache.stencil_front, StencilFace::Front, &ds.front);
        self.apply_stencil_face(&mut cache.stencil_back, StencilFace::Back, &ds.back);

        let blend_state = &pipeline.info().blend;
        let target = blend_state.target0();
        if cache.blend_enabled != target.blend {
            driver.set_capability(Capability::Blend, target.blend);
            cache.blend_enabled = target.blend;
        }
        if target.blend {
            if cache.blend.op != target.op || cache.blend.alpha_op != target.alpha_op {
                driver.blend_equation(target.op, target.alpha_op);
                cache.blend.op = target.op;
                cache.blend.alpha_op = target.alpha_op;
            }
            if cache.blend.src_factor != target.src_factor
                || cache.blend.dst_factor != target.dst_factor
                || cache.blend.src_alpha_factor != target.src_alpha_factor
                || cache.blend.dst_alpha_factor != target.dst_alpha_factor
            {
                driver.blend_func(
                    target.src_factor,
                    target.dst_factor,
                    target.src_alpha_factor,
                    target.dst_alpha_factor,
                );
                cache.blend.src_factor = target.src_factor;
                cache.blend.dst_factor = target.dst_factor;
                cache.blend.src_alpha_factor = target.src_alpha_factor;
                cache.blend.dst_alpha_factor = target.dst_alpha_factor;
            }
            if cache.blend_color != blend_state.blend_color {
                driver.blend_color(blend_state.blend_color);
                cache.blend_color = blend_state.blend_color;
            }
        }
        if cache.color_mask != target.color_mask {
            driver.color_mask(target.color_mask);
            cache.color_mask = target.color_mask;
        }

        cache.pipeline_id = Some(pipeline.id());
    }

    fn apply_stencil_face(
        &self,
        cached: &mut StencilFaceState,
        face: StencilFace,
        wanted: &StencilFaceState,
    ) {
        let driver = self.driver();
        if cached.func != wanted.func
            || cached.reference != wanted.reference
            || cached.read_mask != wanted.read_mask
        {
            driver.stencil_func(face, wanted.func, wanted.reference, wanted.read_mask);
            cached.func = wanted.func;
            cached.reference = wanted.reference;
            cached.read_mask = wanted.read_mask;
        }
        if cached.fail_op != wanted.fail_op
            || cached.depth_fail_op != wanted.depth_fail_op
            || cached.pass_op != wanted.pass_op
        {
            driver.stencil_op(face, wanted.fail_op, wanted.depth_fail_op, wanted.pass_op);
            cached.fail_op = wanted.fail_op;
            cached.depth_fail_op = wanted.depth_fail_op;
            cached.pass_op = wanted.pass_op;
        }
        if cached.write_mask != wanted.write_mask {
            driver.stencil_write_mask(face, wanted.write_mask);
            cached.write_mask = wanted.write_mask;
        }
        cached.test = wanted.test;
    }

    /// Walk the active shader's reflection for `set_index`, binding only the
    /// slots a stage actually reads. Unbound slots fall back to the device
    /// placeholders with a warning; a missing layout slot is a programming
    /// error and skipped.
    pub(crate) fn bind_descriptor_set(
        &self,
        pipeline: &PipelineState,
        set_index: u32,
        set: &DescriptorSet,
        dynamic_offsets: &[u64],
        defaults: &DeviceDefaults,
    ) {
        let driver = self.driver();
        let Some(shader) = pipeline.shader().gpu().gles() else {
            return;
        };

        let mut cache = self.cache.lock();

        for (block_index, block) in pipeline.shader().blocks().iter().enumerate() {
            if block.set != set_index {
                continue;
            }
            let Some(native_slot) = shader.block_bindings.get(block_index).copied() else {
                continue;
            };
            let slot = set
                .layout()
                .flat_index(block.binding, 0)
                .and_then(|flat| set.slot(flat));
            let Some(slot) = slot else {
                log::error!(
                    "descriptor set {}: block {:?} at {{{set_index}, {}}} not in layout",
                    set.id(),
                    block.name,
                    block.binding
                );
                continue;
            };

            let (handle, mut offset, size) = match &slot.buffer {
                Some(view) => match view.buffer().gpu().gles() {
                    Some(gles) => (gles.handle, view.offset(), view.range()),
                    None => continue,
                },
                None => {
                    log::warn!(
                        "descriptor set {}: no buffer at {{{set_index}, {}}} for block {:?}, \
                         substituting placeholder",
                        set.id(),
                        block.binding,
                        block.name
                    );
                    match defaults.buffer.gpu().gles() {
                        Some(gles) => (gles.handle, 0, defaults.buffer.size()),
                        None => continue,
                    }
                }
            };

            if let Some(index) = pipeline.dynamic_offset_index(set_index, block.binding) {
                if let Some(dynamic) = dynamic_offsets.get(index as usize) {
                    offset += dynamic;
                } else {
                    log::error!(
                        "descriptor set {}: dynamic offset {index} for block {:?} not supplied \
                         ({} offsets given)",
                        set.id(),
                        block.name,
                        dynamic_offsets.len()
                    );
                }
            }

            let wanted = UboBinding {
                handle,
                offset,
                size,
            };
            if let Some(cached) = cache.ubo_bindings.get_mut(native_slot as usize) {
                if *cached != wanted {
                    driver.bind_buffer_range(
                        BufferTarget::Uniform,
                        native_slot,
                        handle,
                        offset,
                        size,
                    );
                    *cached = wanted;
                }
            }
        }

        for (sampler_index, reflected) in pipeline.shader().samplers().iter().enumerate() {
            if reflected.set != set_index {
                continue;
            }
            let Some(base_unit) = shader.sampler_units.get(sampler_index).copied() else {
                continue;
            };
            for array_index in 0..reflected.count.max(1) {
                let unit = (base_unit + array_index) as usize;
                let slot = set
                    .layout()
                    .flat_index(reflected.binding, array_index)
                    .and_then(|flat| set.slot(flat));
                let Some(slot) = slot else {
                    log::error!(
                        "descriptor set {}: sampler {:?} at {{{set_index}, {}}}[{array_index}] \
                         not in layout",
                        set.id(),
                        reflected.name,
                        reflected.binding
                    );
                    continue;
                };

                let texture = match &slot.texture {
                    Some(view) => view.texture().gpu().gles().map(|t| t.handle),
                    None => {
                        log::warn!(
                            "descriptor set {}: no texture at {{{set_index}, {}}}[{array_index}] \
                             for sampler {:?}, substituting placeholder",
                            set.id(),
                            reflected.binding,
                            reflected.name
                        );
                        defaults.texture.gpu().gles().map(|t| t.handle)
                    }
                };
                let sampler = match &slot.sampler {
                    Some(sampler) => sampler.gpu().gles().map(|s| s.handle),
                    None => defaults.sampler.gpu().gles().map(|s| s.handle),
                };

                if let (Some(texture), Some(sampler)) = (texture, sampler) {
                    if cache.texture_units.get(unit) != Some(&texture) {
                        driver.bind_texture_unit(unit as u32, texture);
                        cache.texture_units[unit] = texture;
                    }
                    if cache.sampler_units.get(unit) != Some(&sampler) {
                        driver.bind_sampler_unit(unit as u32, sampler);
                        cache.sampler_units[unit] = sampler;
                    }
                }
            }
        }
    }

    /// Attach vertex/index streams. With VAO support a VAO is built once per
    /// (input assembler, shader program) pairing and rebinding it is a
    /// single call; without VAOs, attribute enables are diffed against the
    /// cache bitset so stale locations are disabled exactly once.
    pub(crate) fn bind_input_assembler(&self, pipeline: &PipelineState, ia: &InputAssembler) {
        let driver = self.driver();
        let Some(shader) = pipeline.shader().gpu().gles() else {
            return;
        };
        let Some(registration) = ia.gpu().gles() else {
            return;
        };

        if self.capabilities().vertex_array_objects {
            let mut map = self.vao_map.lock();
            let key = (registration.id, shader.program);
            let vao = match map.get(&key) {
                Some(vao) => *vao,
                None => {
                    let vao = self.build_vao(pipeline, ia);
                    map.insert(key, vao);
                    return;
                }
            };
            drop(map);

            let mut cache = self.cache.lock();
            if cache.vao != vao {
                driver.bind_vertex_array(vao);
                cache.vao = vao;
            }
            return;
        }

        let mut cache = self.cache.lock();
        if cache.vao != 0 {
            driver.bind_vertex_array(0);
            cache.vao = 0;
            cache.element_buffer = 0;
        }

        let mut wanted_attribs = 0u64;
        for declared in pipeline.shader().attributes() {
            let Some(attribute) = ia.attributes().iter().find(|a| a.name == declared.name) else {
                continue;
            };
            let Some(view) = ia.vertex_buffers().get(attribute.stream as usize) else {
                continue;
            };
            let Some(gles) = view.buffer().gpu().gles() else {
                continue;
            };
            if cache.array_buffer != gles.handle {
                driver.bind_buffer(BufferTarget::Array, gles.handle);
                cache.array_buffer = gles.handle;
            }
            let location = declared.location;
            if !cache.attrib_enabled(location) {
                driver.enable_vertex_attrib(location);
                cache.set_attrib_enabled(location, true);
            }
            driver.vertex_attrib_pointer(
                location,
                attribute.format,
                view.buffer().stride() as u32,
                view.offset() as u32,
                if attribute.is_instanced { 1 } else { 0 },
            );
            wanted_attribs |= 1 << location.min(63);
        }

        let stale = cache.enabled_attribs & !wanted_attribs;
        for location in 0..64 {
            if stale & (1 << location) != 0 {
                driver.disable_vertex_attrib(location);
                cache.set_attrib_enabled(location, false);
            }
        }

        if let Some(view) = ia.index_buffer() {
            if let Some(gles) = view.buffer().gpu().gles() {
                if cache.element_buffer != gles.handle {
                    driver.bind_buffer(BufferTarget::ElementArray, gles.handle);
                    cache.element_buffer = gles.handle;
                }
            }
        }
    }

    /// Record attribute and index-buffer state into a fresh VAO, which stays
    /// bound afterwards.
    fn build_vao(&self, pipeline: &PipelineState, ia: &InputAssembler) -> u32 {
        let driver = self.driver();
        let vao = driver.create_vertex_array();

        let mut cache = self.cache.lock();
        driver.bind_vertex_array(vao);
        cache.vao = vao;

        for declared in pipeline.shader().attributes() {
            let Some(attribute) = ia.attributes().iter().find(|a| a.name == declared.name) else {
                continue;
            };
            let Some(view) = ia.vertex_buffers().get(attribute.stream as usize) else {
                continue;
            };
            let Some(gles) = view.buffer().gpu().gles() else {
                continue;
            };
            driver.bind_buffer(BufferTarget::Array, gles.handle);
            cache.array_buffer = gles.handle;
            driver.enable_vertex_attrib(declared.location);
            driver.vertex_attrib_pointer(
                declared.location,
                attribute.format,
                view.buffer().stride() as u32,
                view.offset() as u32,
                if attribute.is_instanced { 1 } else { 0 },
            );
        }
        if let Some(view) = ia.index_buffer() {
            if let Some(gles) = view.buffer().gpu().gles() {
                driver.bind_buffer(BufferTarget::ElementArray, gles.handle);
            }
        }
        // Attribute enables live inside the VAO, not the global bitset.
        cache.element_buffer = 0;
        vao
    }

    pub(crate) fn set_viewport(&self, viewport: Viewport) {
        let mut cache = self.cache.lock();
        if cache.viewport != viewport {
            self.driver().viewport(viewport);
            cache.viewport = viewport;
        }
    }

    pub(crate) fn set_scissor(&self, scissor: Rect) {
        let mut cache = self.cache.lock();
        if cache.scissor != scissor {
            self.driver().scissor(scissor);
            cache.scissor = scissor;
        }
    }

    pub(crate) fn begin_render_pass(
        &self,
        framebuffer: Option<&Framebuffer>,
        render_area: Rect,
        clear_colors: &[Color],
    ) {
        let driver = self.driver();
        let mut cache = self.cache.lock();

        let handle = framebuffer
            .and_then(|fb| fb.gpu().gles())
            .map_or(0, |fb| fb.handle);
        if cache.framebuffer != handle {
            driver.bind_framebuffer(handle);
            cache.framebuffer = handle;
        }

        let viewport = Viewport::new(
            render_area.x,
            render_area.y,
            render_area.width,
            render_area.height,
        );
        if cache.viewport != viewport {
            driver.viewport(viewport);
            cache.viewport = viewport;
        }
        if cache.scissor != render_area {
            driver.scissor(render_area);
            cache.scissor = render_area;
        }

        let Some(fb) = framebuffer else {
            return;
        };
        let info = fb.render_pass().info();

        let clear_color = info
            .colors
            .iter()
            .enumerate()
            .find(|(_, c)| c.load_op == LoadOp::Clear)
            .map(|(index, c)| clear_colors.get(index).copied().unwrap_or(c.clear_color));
        let clear_depth = info
            .depth_stencil
            .as_ref()
            .filter(|ds| ds.depth_load_op == LoadOp::Clear)
            .map(|ds| ds.clear_depth);
        let clear_stencil = info
            .depth_stencil
            .as_ref()
            .filter(|ds| ds.stencil_load_op == LoadOp::Clear)
            .map(|ds| ds.clear_stencil);

        if clear_color.is_none() && clear_depth.is_none() && clear_stencil.is_none() {
            return;
        }
        // Clears honor the current masks, so force them open first.
        if clear_color.is_some() && cache.color_mask != ColorMask::ALL {
            driver.color_mask(ColorMask::ALL);
            cache.color_mask = ColorMask::ALL;
        }
        if clear_depth.is_some() && !cache.depth_write {
            driver.depth_mask(true);
            cache.depth_write = true;
        }
        driver.clear(clear_color, clear_depth, clear_stencil);
    }

    pub(crate) fn end_render_pass(&self) {
        // Nothing to do: store ops are implicit in GL.
    }

    pub(crate) fn draw(&self, ia: &InputAssembler, info: &crate::types::DrawInfo) {
        let driver = self.driver();
        let topology = self.cache.lock().topology;
        if info.is_indexed() {
            let offset = ia
                .index_buffer()
                .map_or(0, |v| v.offset())
                + info.first_index as u64 * ia.index_format().size() as u64;
            driver.draw_elements(
                topology,
                info.index_count,
                ia.index_format(),
                offset,
                info.instances(),
            );
        } else {
            driver.draw_arrays(topology, info.first_vertex, info.vertex_count, info.instances());
        }
    }
}
