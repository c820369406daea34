//! Framebuffers.

use std::sync::Arc;

use crate::backend::GpuFramebuffer;
use crate::error::{GfxError, GfxResult};

use super::next_resource_id;
use super::render_pass::RenderPass;
use super::texture::TextureView;

/// A set of attachments compatible with one render pass.
#[derive(Debug)]
pub struct Framebuffer {
    id: u64,
    render_pass: Arc<RenderPass>,
    colors: Vec<TextureView>,
    depth_stencil: Option<TextureView>,
    gpu: GpuFramebuffer,
}

impl Framebuffer {
    /// Attachment count and formats must match the render pass exactly.
    pub(crate) fn validate(
        render_pass: &RenderPass,
        colors: &[TextureView],
        depth_stencil: Option<&TextureView>,
    ) -> GfxResult<()> {
        let info = render_pass.info();
        if colors.len() != info.colors.len() {
            return Err(GfxError::InvalidParameter(format!(
                "framebuffer: {} color attachments, render pass {:?} expects {}",
                colors.len(),
                info.label,
                info.colors.len()
            )));
        }
        for (index, (view, desc)) in colors.iter().zip(&info.colors).enumerate() {
            let format = view.texture().info().format;
            if format != desc.format {
                return Err(GfxError::InvalidParameter(format!(
                    "framebuffer: color attachment {index} is {format:?}, render pass expects {:?}",
                    desc.format
                )));
            }
        }
        match (depth_stencil, &info.depth_stencil) {
            (None, None) => {}
            (Some(view), Some(desc)) => {
                let format = view.texture().info().format;
                if format != desc.format {
                    return Err(GfxError::InvalidParameter(format!(
                        "framebuffer: depth attachment is {format:?}, render pass expects {:?}",
                        desc.format
                    )));
                }
            }
            (have, _) => {
                return Err(GfxError::InvalidParameter(format!(
                    "framebuffer: depth attachment {}, render pass {:?} says otherwise",
                    if have.is_some() { "present" } else { "missing" },
                    info.label
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn new(
        render_pass: Arc<RenderPass>,
        colors: Vec<TextureView>,
        depth_stencil: Option<TextureView>,
        gpu: GpuFramebuffer,
    ) -> Self {
        Self {
            id: next_resource_id(),
            render_pass,
            colors,
            depth_stencil,
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn colors(&self) -> &[TextureView] {
        &self.colors
    }

    pub fn depth_stencil(&self) -> Option<&TextureView> {
        self.depth_stencil.as_ref()
    }

    pub(crate) fn gpu(&self) -> &GpuFramebuffer {
        &self.gpu
    }
}
