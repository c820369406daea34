//! Render passes.

use crate::backend::GpuRenderPass;
use crate::error::{GfxError, GfxResult};
use crate::types::RenderPassInfo;

use super::next_resource_id;

#[derive(Debug)]
pub struct RenderPass {
    id: u64,
    info: RenderPassInfo,
    gpu: GpuRenderPass,
}

impl RenderPass {
    pub(crate) fn validate(info: &RenderPassInfo) -> GfxResult<()> {
        if info.colors.is_empty() && info.depth_stencil.is_none() {
            return Err(GfxError::InvalidParameter(format!(
                "render pass {:?}: no attachments",
                info.label
            )));
        }
        for (index, color) in info.colors.iter().enumerate() {
            if color.format.is_depth() {
                return Err(GfxError::InvalidParameter(format!(
                    "render pass {:?}: color attachment {index} has depth format {:?}",
                    info.label, color.format
                )));
            }
        }
        if let Some(ds) = &info.depth_stencil {
            if !ds.format.is_depth() {
                return Err(GfxError::InvalidParameter(format!(
                    "render pass {:?}: depth attachment has color format {:?}",
                    info.label, ds.format
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn new(info: RenderPassInfo, gpu: GpuRenderPass) -> Self {
        Self {
            id: next_resource_id(),
            info,
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &RenderPassInfo {
        &self.info
    }

    pub(crate) fn gpu(&self) -> &GpuRenderPass {
        &self.gpu
    }
}
