//! Render pass descriptions.

use super::common::Color;
use super::texture::{Format, SampleCount};

/// What happens to an attachment's contents when the pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve existing contents.
    Load,
    #[default]
    Clear,
    /// Contents are undefined; cheapest option on tiled GPUs.
    Discard,
}

/// What happens to an attachment's contents when the pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    #[default]
    Store,
    Discard,
}

/// One color attachment of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachmentDesc {
    pub format: Format,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: Color,
}

impl ColorAttachmentDesc {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::X1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: Color::BLACK,
        }
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_ops(mut self, load_op: LoadOp, store_op: StoreOp) -> Self {
        self.load_op = load_op;
        self.store_op = store_op;
        self
    }
}

/// Optional depth/stencil attachment of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilAttachmentDesc {
    pub format: Format,
    pub samples: SampleCount,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

impl DepthStencilAttachmentDesc {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::X1,
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::Store,
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::Discard,
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

/// Full render pass description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassInfo {
    pub label: Option<String>,
    pub colors: Vec<ColorAttachmentDesc>,
    pub depth_stencil: Option<DepthStencilAttachmentDesc>,
}

impl RenderPassInfo {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: ColorAttachmentDesc) -> Self {
        self.colors.push(color);
        self
    }

    pub fn with_depth_stencil(mut self, ds: DepthStencilAttachmentDesc) -> Self {
        self.depth_stencil = Some(ds);
        self
    }
}
