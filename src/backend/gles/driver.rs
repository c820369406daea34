//! The native-call seam of the GL-family backend.
//!
//! All GL calls the backend ever issues go through [`GlesDriver`]. Production
//! embedders implement it over loaded function pointers; the crate ships
//! [`RecordingDriver`], which records every call so tests and headless runs
//! can assert exactly which native work a command sequence produced.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{
    BlendFactor, BlendOp, Color, ColorMask, CompareFunc, CullMode, Format, IndexFormat,
    PrimitiveTopology, Rect, SamplerInfo, StencilFace, StencilOp, Viewport,
};

/// GL buffer binding targets the backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
    ShaderStorage,
}

/// Toggleable GL capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace,
    DepthTest,
    StencilTest,
    Blend,
    PolygonOffsetFill,
    ScissorTest,
}

/// Framebuffer attachment points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    DepthStencil,
}

/// Context limits reported by the driver at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlesCapabilities {
    pub vertex_array_objects: bool,
    pub texture_units: u32,
    pub uniform_buffer_bindings: u32,
}

impl Default for GlesCapabilities {
    fn default() -> Self {
        Self {
            vertex_array_objects: true,
            texture_units: 16,
            uniform_buffer_bindings: 12,
        }
    }
}

/// One recorded native call. Mirrors [`GlesDriver`] one to one.
#[derive(Debug, Clone, PartialEq)]
pub enum GlesCall {
    CreateBuffer(u32),
    DeleteBuffer(u32),
    CreateTexture(u32),
    DeleteTexture(u32),
    CreateSampler(u32),
    DeleteSampler(u32),
    CreateProgram(u32),
    DeleteProgram(u32),
    CreateVertexArray(u32),
    DeleteVertexArray(u32),
    CreateFramebuffer(u32),
    DeleteFramebuffer(u32),
    BufferData {
        target: BufferTarget,
        handle: u32,
        size: u64,
    },
    BufferSubData {
        target: BufferTarget,
        handle: u32,
        offset: u64,
        len: u64,
    },
    TextureStorage {
        handle: u32,
        width: u32,
        height: u32,
        mip_levels: u32,
    },
    SamplerParameters(u32),
    UseProgram(u32),
    BindVertexArray(u32),
    BindBuffer {
        target: BufferTarget,
        handle: u32,
    },
    BindBufferRange {
        target: BufferTarget,
        slot: u32,
        handle: u32,
        offset: u64,
        size: u64,
    },
    BindTextureUnit {
        unit: u32,
        handle: u32,
    },
    BindSamplerUnit {
        unit: u32,
        handle: u32,
    },
    SetCapability {
        cap: Capability,
        enabled: bool,
    },
    CullFace(CullMode),
    FrontFaceCcw(bool),
    PolygonOffset {
        constant: f32,
        slope: f32,
    },
    LineWidth(f32),
    DepthMask(bool),
    DepthFunc(CompareFunc),
    StencilFunc {
        face: StencilFace,
        func: CompareFunc,
        reference: u32,
        read_mask: u32,
    },
    StencilOps {
        face: StencilFace,
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    },
    StencilWriteMask {
        face: StencilFace,
        mask: u32,
    },
    BlendEquation {
        op: BlendOp,
        alpha_op: BlendOp,
    },
    BlendFunc {
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    BlendColor(Color),
    SetColorMask(ColorMask),
    SetViewport(Viewport),
    SetScissor(Rect),
    EnableVertexAttrib(u32),
    DisableVertexAttrib(u32),
    VertexAttribPointer {
        location: u32,
        format: Format,
        stride: u32,
        offset: u32,
        divisor: u32,
    },
    BindFramebuffer(u32),
    FramebufferTexture {
        attachment: Attachment,
        texture: u32,
        mip: u32,
    },
    Clear {
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<u32>,
    },
    DrawArrays {
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    },
    DrawElements {
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
        instances: u32,
    },
    Flush,
}

impl GlesCall {
    /// Whether this call mutates pipeline state (as opposed to creating,
    /// uploading or drawing). Used by cache-idempotence assertions.
    pub fn is_state_call(&self) -> bool {
        matches!(
            self,
            Self::UseProgram(_)
                | Self::BindVertexArray(_)
                | Self::SetCapability { .. }
                | Self::CullFace(_)
                | Self::FrontFaceCcw(_)
                | Self::PolygonOffset { .. }
                | Self::LineWidth(_)
                | Self::DepthMask(_)
                | Self::DepthFunc(_)
                | Self::StencilFunc { .. }
                | Self::StencilOps { .. }
                | Self::StencilWriteMask { .. }
                | Self::BlendEquation { .. }
                | Self::BlendFunc { .. }
                | Self::BlendColor(_)
                | Self::SetColorMask(_)
                | Self::SetViewport(_)
                | Self::SetScissor(_)
        )
    }
}

/// The set of native entry points the GL-family backend needs.
///
/// Methods take `&self`; implementations guard their own interior state. The
/// backend serializes calls per device, so no ordering guarantees beyond that
/// are required of implementors.
pub trait GlesDriver: Send + Sync + std::fmt::Debug {
    fn capabilities(&self) -> GlesCapabilities;

    fn create_buffer(&self) -> u32;
    fn delete_buffer(&self, handle: u32);
    fn create_texture(&self) -> u32;
    fn delete_texture(&self, handle: u32);
    fn create_sampler(&self) -> u32;
    fn delete_sampler(&self, handle: u32);
    fn create_program(&self, label: &str) -> u32;
    fn delete_program(&self, handle: u32);
    fn create_vertex_array(&self) -> u32;
    fn delete_vertex_array(&self, handle: u32);
    fn create_framebuffer(&self) -> u32;
    fn delete_framebuffer(&self, handle: u32);

    fn buffer_data(&self, target: BufferTarget, handle: u32, size: u64);
    fn buffer_sub_data(&self, target: BufferTarget, handle: u32, offset: u64, data: &[u8]);
    fn texture_storage(&self, handle: u32, width: u32, height: u32, mip_levels: u32);
    fn sampler_parameters(&self, handle: u32, info: &SamplerInfo);

    fn use_program(&self, handle: u32);
    fn bind_vertex_array(&self, handle: u32);
    fn bind_buffer(&self, target: BufferTarget, handle: u32);
    fn bind_buffer_range(&self, target: BufferTarget, slot: u32, handle: u32, offset: u64, size: u64);
    fn bind_texture_unit(&self, unit: u32, handle: u32);
    fn bind_sampler_unit(&self, unit: u32, handle: u32);
    fn set_capability(&self, cap: Capability, enabled: bool);
    fn cull_face(&self, mode: CullMode);
    fn front_face_ccw(&self, ccw: bool);
    fn polygon_offset(&self, constant: f32, slope: f32);
    fn line_width(&self, width: f32);
    fn depth_mask(&self, write: bool);
    fn depth_func(&self, func: CompareFunc);
    fn stencil_func(&self, face: StencilFace, func: CompareFunc, reference: u32, read_mask: u32);
    fn stencil_op(&self, face: StencilFace, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    fn stencil_write_mask(&self, face: StencilFace, mask: u32);
    fn blend_equation(&self, op: BlendOp, alpha_op: BlendOp);
    fn blend_func(
        &self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn blend_color(&self, color: Color);
    fn color_mask(&self, mask: ColorMask);
    fn viewport(&self, viewport: Viewport);
    fn scissor(&self, rect: Rect);
    fn enable_vertex_attrib(&self, location: u32);
    fn disable_vertex_attrib(&self, location: u32);
    fn vertex_attrib_pointer(&self, location: u32, format: Format, stride: u32, offset: u32, divisor: u32);
    fn bind_framebuffer(&self, handle: u32);
    fn framebuffer_texture(&self, attachment: Attachment, texture: u32, mip: u32);
    fn clear(&self, color: Option<Color>, depth: Option<f32>, stencil: Option<u32>);

    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32, instances: u32);
    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
        instances: u32,
    );
    fn flush(&self);
}

/// Shared view of a [`RecordingDriver`]'s call log. Stays usable after the
/// driver itself has been boxed into a device.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<GlesCall>>>,
}

impl CallLog {
    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<GlesCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&GlesCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Number of recorded state-mutating calls.
    pub fn state_call_count(&self) -> usize {
        self.count_calls(GlesCall::is_state_call)
    }

    /// Forget everything recorded so far.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

/// Driver that records calls instead of issuing them.
///
/// Handles are allocated from a monotonic counter starting at 1 (0 stays the
/// "no object" value, as in GL).
#[derive(Debug, Default)]
pub struct RecordingDriver {
    capabilities: GlesCapabilities,
    next_handle: AtomicU32,
    log: CallLog,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver reporting no VAO support, forcing the per-attribute path.
    pub fn without_vao() -> Self {
        Self {
            capabilities: GlesCapabilities {
                vertex_array_objects: false,
                ..GlesCapabilities::default()
            },
            ..Self::default()
        }
    }

    /// A handle onto the call log that survives boxing the driver.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&self, call: GlesCall) {
        log::trace!("gles call: {:?}", call);
        self.log.calls.lock().push(call);
    }

    fn alloc_handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<GlesCall> {
        self.log.calls()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&GlesCall) -> bool) -> usize {
        self.log.count_calls(pred)
    }

    /// Number of recorded state-mutating calls.
    pub fn state_call_count(&self) -> usize {
        self.log.state_call_count()
    }

    /// Forget everything recorded so far.
    pub fn clear_calls(&self) {
        self.log.clear_calls()
    }
}

impl GlesDriver for RecordingDriver {
    fn capabilities(&self) -> GlesCapabilities {
        self.capabilities
    }

    fn create_buffer(&self) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateBuffer(handle));
        handle
    }

    fn delete_buffer(&self, handle: u32) {
        self.record(GlesCall::DeleteBuffer(handle));
    }

    fn create_texture(&self) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateTexture(handle));
        handle
    }

    fn delete_texture(&self, handle: u32) {
        self.record(GlesCall::DeleteTexture(handle));
    }

    fn create_sampler(&self) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateSampler(handle));
        handle
    }

    fn delete_sampler(&self, handle: u32) {
        self.record(GlesCall::DeleteSampler(handle));
    }

    fn create_program(&self, _label: &str) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateProgram(handle));
        handle
    }

    fn delete_program(&self, handle: u32) {
        self.record(GlesCall::DeleteProgram(handle));
    }

    fn create_vertex_array(&self) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateVertexArray(handle));
        handle
    }

    fn delete_vertex_array(&self, handle: u32) {
        self.record(GlesCall::DeleteVertexArray(handle));
    }

    fn create_framebuffer(&self) -> u32 {
        let handle = self.alloc_handle();
        self.record(GlesCall::CreateFramebuffer(handle));
        handle
    }

    fn delete_framebuffer(&self, handle: u32) {
        self.record(GlesCall::DeleteFramebuffer(handle));
    }

    fn buffer_data(&self, target: BufferTarget, handle: u32, size: u64) {
        self.record(GlesCall::BufferData {
            target,
            handle,
            size,
        });
    }

    fn buffer_sub_data(&self, target: BufferTarget, handle: u32, offset: u64, data: &[u8]) {
        self.record(GlesCall::BufferSubData {
            target,
            handle,
            offset,
            len: data.len() as u64,
        });
    }

    fn texture_storage(&self, handle: u32, width: u32, height: u32, mip_levels: u32) {
        self.record(GlesCall::TextureStorage {
            handle,
            width,
            height,
            mip_levels,
        });
    }

    fn sampler_parameters(&self, handle: u32, _info: &SamplerInfo) {
        self.record(GlesCall::SamplerParameters(handle));
    }

    fn use_program(&self, handle: u32) {
        self.record(GlesCall::UseProgram(handle));
    }

    fn bind_vertex_array(&self, handle: u32) {
        self.record(GlesCall::BindVertexArray(handle));
    }

    fn bind_buffer(&self, target: BufferTarget, handle: u32) {
        self.record(GlesCall::BindBuffer { target, handle });
    }

    fn bind_buffer_range(&self, target: BufferTarget, slot: u32, handle: u32, offset: u64, size: u64) {
        self.record(GlesCall::BindBufferRange {
            target,
            slot,
            handle,
            offset,
            size,
        });
    }

    fn bind_texture_unit(&self, unit: u32, handle: u32) {
        self.record(GlesCall::BindTextureUnit { unit, handle });
    }

    fn bind_sampler_unit(&self, unit: u32, handle: u32) {
        self.record(GlesCall::BindSamplerUnit { unit, handle });
    }

    fn set_capability(&self, cap: Capability, enabled: bool) {
        self.record(GlesCall::SetCapability { cap, enabled });
    }

    fn cull_face(&self, mode: CullMode) {
        self.record(GlesCall::CullFace(mode));
    }

    fn front_face_ccw(&self, ccw: bool) {
        self.record(GlesCall::FrontFaceCcw(ccw));
    }

    fn polygon_offset(&self, constant: f32, slope: f32) {
        self.record(GlesCall::PolygonOffset { constant, slope });
    }

    fn line_width(&self, width: f32) {
        self.record(GlesCall::LineWidth(width));
    }

    fn depth_mask(&self, write: bool) {
        self.record(GlesCall::DepthMask(write));
    }

    fn depth_func(&self, func: CompareFunc) {
        self.record(GlesCall::DepthFunc(func));
    }

    fn stencil_func(&self, face: StencilFace, func: CompareFunc, reference: u32, read_mask: u32) {
        self.record(GlesCall::StencilFunc {
            face,
            func,
            reference,
            read_mask,
        });
    }

    fn stencil_op(&self, face: StencilFace, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.record(GlesCall::StencilOps {
            face,
            fail,
            depth_fail,
            pass,
        });
    }

    fn stencil_write_mask(&self, face: StencilFace, mask: u32) {
        self.record(GlesCall::StencilWriteMask { face, mask });
    }

    fn blend_equation(&self, op: BlendOp, alpha_op: BlendOp) {
        self.record(GlesCall::BlendEquation { op, alpha_op });
    }

    fn blend_func(
        &self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(GlesCall::BlendFunc {
            src,
            dst,
            src_alpha,
            dst_alpha,
        });
    }

    fn blend_color(&self, color: Color) {
        self.record(GlesCall::BlendColor(color));
    }

    fn color_mask(&self, mask: ColorMask) {
        self.record(GlesCall::SetColorMask(mask));
    }

    fn viewport(&self, viewport: Viewport) {
        self.record(GlesCall::SetViewport(viewport));
    }

    fn scissor(&self, rect: Rect) {
        self.record(GlesCall::SetScissor(rect));
    }

    fn enable_vertex_attrib(&self, location: u32) {
        self.record(GlesCall::EnableVertexAttrib(location));
    }

    fn disable_vertex_attrib(&self, location: u32) {
        self.record(GlesCall::DisableVertexAttrib(location));
    }

    fn vertex_attrib_pointer(&self, location: u32, format: Format, stride: u32, offset: u32, divisor: u32) {
        self.record(GlesCall::VertexAttribPointer {
            location,
            format,
            stride,
            offset,
            divisor,
        });
    }

    fn bind_framebuffer(&self, handle: u32) {
        self.record(GlesCall::BindFramebuffer(handle));
    }

    fn framebuffer_texture(&self, attachment: Attachment, texture: u32, mip: u32) {
        self.record(GlesCall::FramebufferTexture {
            attachment,
            texture,
            mip,
        });
    }

    fn clear(&self, color: Option<Color>, depth: Option<f32>, stencil: Option<u32>) {
        self.record(GlesCall::Clear {
            color,
            depth,
            stencil,
        });
    }

    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32, instances: u32) {
        self.record(GlesCall::DrawArrays {
            topology,
            first,
            count,
            instances,
        });
    }

    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
        instances: u32,
    ) {
        self.record(GlesCall::DrawElements {
            topology,
            count,
            index_format,
            offset,
            instances,
        });
    }

    fn flush(&self) {
        self.record(GlesCall::Flush);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_one() {
        let driver = RecordingDriver::new();
        assert_eq!(driver.create_buffer(), 1);
        assert_eq!(driver.create_texture(), 2);
    }

    #[test]
    fn counts_state_calls_only() {
        let driver = RecordingDriver::new();
        driver.use_program(3);
        driver.buffer_data(BufferTarget::Array, 1, 64);
        driver.depth_mask(false);
        assert_eq!(driver.state_call_count(), 2);
        assert_eq!(driver.calls().len(), 3);
    }
}
