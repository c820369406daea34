//! Textures and texture views.

use std::sync::Arc;

use crate::backend::GpuTexture;
use crate::descriptor::hub::ObserverList;
use crate::error::{GfxError, GfxResult};
use crate::types::{TextureInfo, TextureViewInfo};

use super::next_resource_id;

/// A GPU texture. Immutable after creation.
#[derive(Debug)]
pub struct Texture {
    id: u64,
    info: TextureInfo,
    gpu: GpuTexture,
    observers: ObserverList,
}

impl Texture {
    /// Validates `info` before any native allocation happens.
    pub(crate) fn validate(info: &TextureInfo) -> GfxResult<()> {
        if info.extent.width == 0 || info.extent.height == 0 || info.extent.depth == 0 {
            return Err(GfxError::InvalidParameter(format!(
                "texture {:?}: zero extent {:?}",
                info.label, info.extent
            )));
        }
        if info.mip_levels == 0 || info.array_layers == 0 {
            return Err(GfxError::InvalidParameter(format!(
                "texture {:?}: mip_levels and array_layers must be at least 1",
                info.label
            )));
        }
        if info.usage.is_empty() {
            return Err(GfxError::InvalidParameter(format!(
                "texture {:?}: empty usage",
                info.label
            )));
        }
        Ok(())
    }

    pub(crate) fn new(info: TextureInfo, gpu: GpuTexture) -> Self {
        Self {
            id: next_resource_id(),
            info,
            gpu,
            observers: ObserverList::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &TextureInfo {
        &self.info
    }

    pub(crate) fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    pub(crate) fn observers(&self) -> &ObserverList {
        &self.observers
    }
}

/// A mip/layer sub-range of a [`Texture`].
#[derive(Debug, Clone)]
pub struct TextureView {
    texture: Arc<Texture>,
    info: TextureViewInfo,
    id: u64,
}

impl TextureView {
    pub fn new(texture: Arc<Texture>, info: TextureViewInfo) -> GfxResult<Self> {
        let parent = texture.info();
        let mips_ok = info.mip_count > 0
            && info
                .base_mip
                .checked_add(info.mip_count)
                .map_or(false, |end| end <= parent.mip_levels);
        let layers_ok = info.layer_count > 0
            && info
                .base_layer
                .checked_add(info.layer_count)
                .map_or(false, |end| end <= parent.array_layers);
        if !mips_ok || !layers_ok {
            return Err(GfxError::InvalidParameter(format!(
                "texture view {:?} outside texture {:?} ({} mips, {} layers)",
                info, parent.label, parent.mip_levels, parent.array_layers
            )));
        }
        Ok(Self {
            texture,
            info,
            id: next_resource_id(),
        })
    }

    /// View of the whole texture.
    pub fn whole(texture: Arc<Texture>) -> Self {
        let info = TextureViewInfo::full(texture.info());
        Self {
            texture,
            info,
            id: next_resource_id(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn info(&self) -> &TextureViewInfo {
        &self.info
    }
}
