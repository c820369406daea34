//! Mirror of the last-applied native state.
//!
//! The backend diffs every incoming state value against this mirror and only
//! issues the native call on mismatch. The mirror is owned by the device
//! context and torn down with it; initial values match the GL context
//! defaults so the very first application of a non-default value always
//! reaches the driver.

use crate::types::{
    BlendFactor, BlendOp, BlendTarget, Color, ColorMask, CompareFunc, CullMode,
    PrimitiveTopology, Rect, StencilFaceState, Viewport,
};

use super::driver::GlesCapabilities;

/// One indexed uniform-buffer binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UboBinding {
    pub handle: u32,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlesStateCache {
    /// Id of the last fully-applied pipeline. Identity match short-circuits
    /// the whole state diff.
    pub pipeline_id: Option<u64>,
    pub program: u32,
    pub vao: u32,
    pub array_buffer: u32,
    pub element_buffer: u32,
    pub framebuffer: u32,
    pub ubo_bindings: Vec<UboBinding>,
    pub texture_units: Vec<u32>,
    pub sampler_units: Vec<u32>,
    /// Bit per enabled vertex attribute location.
    pub enabled_attribs: u64,
    pub topology: PrimitiveTopology,

    pub cull_enabled: bool,
    pub cull_mode: CullMode,
    pub front_face_ccw: bool,
    pub polygon_offset_enabled: bool,
    pub depth_bias: f32,
    pub depth_bias_slope: f32,
    pub line_width: f32,

    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunc,
    pub stencil_test: bool,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,

    pub blend_enabled: bool,
    pub blend: BlendTarget,
    pub blend_color: Color,
    pub color_mask: ColorMask,

    pub scissor_test: bool,
    pub viewport: Viewport,
    pub scissor: Rect,
}

impl GlesStateCache {
    pub fn new(capabilities: &GlesCapabilities) -> Self {
        Self {
            pipeline_id: None,
            program: 0,
            vao: 0,
            array_buffer: 0,
            element_buffer: 0,
            framebuffer: 0,
            ubo_bindings: vec![
                UboBinding::default();
                capabilities.uniform_buffer_bindings as usize
            ],
            texture_units: vec![0; capabilities.texture_units as usize],
            sampler_units: vec![0; capabilities.texture_units as usize],
            enabled_attribs: 0,
            topology: PrimitiveTopology::TriangleList,

            cull_enabled: false,
            cull_mode: CullMode::Back,
            front_face_ccw: true,
            polygon_offset_enabled: false,
            depth_bias: 0.0,
            depth_bias_slope: 0.0,
            line_width: 1.0,

            depth_test: false,
            depth_write: true,
            depth_func: CompareFunc::Less,
            stencil_test: false,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),

            blend_enabled: false,
            blend: BlendTarget {
                blend: false,
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::Zero,
                op: BlendOp::Add,
                src_alpha_factor: BlendFactor::One,
                dst_alpha_factor: BlendFactor::Zero,
                alpha_op: BlendOp::Add,
                color_mask: ColorMask::ALL,
            },
            blend_color: Color::TRANSPARENT,
            color_mask: ColorMask::ALL,

            scissor_test: false,
            viewport: Viewport::default(),
            scissor: Rect::default(),
        }
    }

    /// Forget everything, as after a context loss or external GL use.
    /// The next application of any state value reaches the driver again.
    pub fn reset(&mut self, capabilities: &GlesCapabilities) {
        *self = Self::new(capabilities);
    }

    /// Drop cached bindings of a deleted buffer so a later rebind of a
    /// recycled handle is not elided.
    pub fn forget_buffer(&mut self, handle: u32) {
        if self.array_buffer == handle {
            self.array_buffer = 0;
        }
        if self.element_buffer == handle {
            self.element_buffer = 0;
        }
        for slot in &mut self.ubo_bindings {
            if slot.handle == handle {
                *slot = UboBinding::default();
            }
        }
    }

    /// Same for a deleted texture.
    pub fn forget_texture(&mut self, handle: u32) {
        for unit in &mut self.texture_units {
            if *unit == handle {
                *unit = 0;
            }
        }
    }

    /// Same for a deleted sampler.
    pub fn forget_sampler(&mut self, handle: u32) {
        for unit in &mut self.sampler_units {
            if *unit == handle {
                *unit = 0;
            }
        }
    }

    /// Same for a deleted program.
    pub fn forget_program(&mut self, handle: u32) {
        if self.program == handle {
            self.program = 0;
            self.pipeline_id = None;
        }
    }

    pub fn attrib_enabled(&self, location: u32) -> bool {
        location < 64 && self.enabled_attribs & (1 << location) != 0
    }

    pub fn set_attrib_enabled(&mut self, location: u32, enabled: bool) {
        if location >= 64 {
            return;
        }
        if enabled {
            self.enabled_attribs |= 1 << location;
        } else {
            self.enabled_attribs &= !(1 << location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_context_defaults() {
        let caps = GlesCapabilities::default();
        let mut cache = GlesStateCache::new(&caps);
        cache.program = 5;
        cache.pipeline_id = Some(42);
        cache.set_attrib_enabled(3, true);
        cache.reset(&caps);
        assert_eq!(cache, GlesStateCache::new(&caps));
        assert!(!cache.attrib_enabled(3));
    }

    #[test]
    fn forget_buffer_scrubs_all_slots() {
        let caps = GlesCapabilities::default();
        let mut cache = GlesStateCache::new(&caps);
        cache.array_buffer = 7;
        cache.ubo_bindings[2] = UboBinding {
            handle: 7,
            offset: 256,
            size: 128,
        };
        cache.forget_buffer(7);
        assert_eq!(cache.array_buffer, 0);
        assert_eq!(cache.ubo_bindings[2], UboBinding::default());
    }
}
