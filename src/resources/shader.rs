//! Compiled shaders.
//!
//! A shader carries its reflection (uniform blocks, sampler bindings, vertex
//! inputs) as supplied by the external compiler. The GL-family backend walks
//! this reflection when binding descriptor sets, so it is the source of
//! truth for which slots a draw actually reads.

use crate::backend::GpuShader;
use crate::types::{ShaderInfo, UniformBlock, UniformSampler, VertexAttribute};

use super::next_resource_id;

#[derive(Debug)]
pub struct Shader {
    id: u64,
    info: ShaderInfo,
    gpu: GpuShader,
}

impl Shader {
    pub(crate) fn new(info: ShaderInfo, gpu: GpuShader) -> Self {
        Self {
            id: next_resource_id(),
            info,
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.info.label.as_deref()
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.info.blocks
    }

    pub fn samplers(&self) -> &[UniformSampler] {
        &self.info.samplers
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.info.attributes
    }

    pub(crate) fn gpu(&self) -> &GpuShader {
        &self.gpu
    }
}
