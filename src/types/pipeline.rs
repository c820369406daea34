//! Fixed-function pipeline state vocabulary.
//!
//! These values are compared field-by-field by the GL-style backend's state
//! cache, so every struct here derives `PartialEq` and has a meaningful
//! `Default` matching the native defaults.

use bitflags::bitflags;

use super::common::Color;
use super::texture::Format;

/// Comparison function for depth, stencil and shadow-sampler tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Stencil operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    Zero,
    #[default]
    Keep,
    Replace,
    IncrClamp,
    DecrClamp,
    Invert,
    IncrWrap,
    DecrWrap,
}

/// Blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcAlpha,
    DstAlpha,
    OneMinusSrcAlpha,
    OneMinusDstAlpha,
    SrcColor,
    DstColor,
    OneMinusSrcColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
}

bitflags! {
    /// Color channel write mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl ColorMask {
    pub const ALL: Self = Self::all();
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveTopology {
    /// Triangles produced by one instance of a draw consuming `count`
    /// vertices or indices.
    pub fn triangle_count(self, count: u32) -> u32 {
        match self {
            Self::TriangleList => count / 3,
            Self::TriangleStrip | Self::TriangleFan => count.saturating_sub(2),
            _ => 0,
        }
    }
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Stencil face selector for dynamic stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFace {
    Front,
    Back,
    All,
}

/// Rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub front_face_ccw: bool,
    /// Constant polygon-offset bias.
    pub depth_bias: f32,
    /// Slope-scaled polygon-offset bias.
    pub depth_bias_slope: f32,
    pub line_width: f32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face_ccw: true,
            depth_bias: 0.0,
            depth_bias_slope: 0.0,
            line_width: 1.0,
        }
    }
}

/// Per-face stencil configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFaceState {
    pub test: bool,
    pub func: CompareFunc,
    pub read_mask: u32,
    pub write_mask: u32,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub reference: u32,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            test: false,
            func: CompareFunc::Always,
            read_mask: 0xffff_ffff,
            write_mask: 0xffff_ffff,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            reference: 0,
        }
    }
}

/// Depth/stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunc,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_func: CompareFunc::Less,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

/// Per-target blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendTarget {
    pub blend: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_op: BlendOp,
    pub color_mask: ColorMask,
}

impl BlendTarget {
    /// Standard source-over alpha blending.
    pub fn alpha_blend() -> Self {
        Self {
            blend: true,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_op: BlendOp::Add,
            color_mask: ColorMask::ALL,
        }
    }
}

/// Blend state for all render targets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendState {
    pub alpha_to_coverage: bool,
    pub blend_color: Color,
    /// One entry per color target. Target 0 drives the GL-style backend's
    /// global blend state.
    pub targets: Vec<BlendTarget>,
}

impl BlendState {
    /// Single opaque target.
    pub fn opaque() -> Self {
        Self {
            alpha_to_coverage: false,
            blend_color: Color::TRANSPARENT,
            targets: vec![BlendTarget::default()],
        }
    }

    /// The target-0 configuration (default if none supplied).
    pub fn target0(&self) -> BlendTarget {
        self.targets.first().copied().unwrap_or_default()
    }
}

/// Vertex attribute description used by shaders and input assemblers.
///
/// Attributes are matched between a shader's declared inputs and an input
/// assembler's supplied streams by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub format: Format,
    /// Which vertex buffer stream this attribute reads from.
    pub stream: u32,
    pub is_normalized: bool,
    pub is_instanced: bool,
    /// Shader input location.
    pub location: u32,
}

impl VertexAttribute {
    /// Create a new attribute bound to stream 0.
    pub fn new(name: impl Into<String>, format: Format, location: u32) -> Self {
        Self {
            name: name.into(),
            format,
            stream: 0,
            is_normalized: false,
            is_instanced: false,
            location,
        }
    }
}

/// Tie-break policy for dynamic-offset index assignment when one binding is
/// visible to several shader stages.
///
/// The reference behavior is first-match-wins per stage; it is kept explicit
/// and configurable so embedders relying on a different convention can say
/// so instead of silently diverging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DynamicOffsetPolicy {
    /// The first stage to claim a binding fixes its dynamic-offset index;
    /// later stages reuse it.
    #[default]
    FirstMatchWins,
    /// Every dynamic binding gets exactly one index in layout order,
    /// independent of stage visibility.
    LayoutOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_count_by_topology() {
        assert_eq!(PrimitiveTopology::TriangleList.triangle_count(9), 3);
        assert_eq!(PrimitiveTopology::TriangleStrip.triangle_count(9), 7);
        assert_eq!(PrimitiveTopology::TriangleFan.triangle_count(9), 7);
        assert_eq!(PrimitiveTopology::TriangleStrip.triangle_count(1), 0);
        assert_eq!(PrimitiveTopology::LineList.triangle_count(9), 0);
    }

    #[test]
    fn blend_state_target0_defaults() {
        let bs = BlendState::default();
        assert_eq!(bs.target0(), BlendTarget::default());
        assert!(!bs.target0().blend);
    }
}
