//! Shader descriptions and the reflection data that drives descriptor
//! binding.
//!
//! The reflection lists (`blocks`, `samplers`) are the source of truth for
//! which descriptor slots a pipeline actually reads. The GL-style backend
//! walks them when descriptor sets are bound and skips slots no stage
//! references.

use bitflags::bitflags;

use super::pipeline::VertexAttribute;

bitflags! {
    /// Shader stage visibility mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u8 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

impl Default for ShaderStageFlags {
    fn default() -> Self {
        Self::VERTEX | Self::FRAGMENT
    }
}

/// A single compiled stage.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    pub stage: ShaderStageFlags,
    /// Backend-specific source or bytecode (GLSL text, SPIR-V words as
    /// bytes).
    pub source: Vec<u8>,
    pub entry_point: String,
}

impl ShaderStage {
    pub fn new(stage: ShaderStageFlags, source: impl Into<Vec<u8>>) -> Self {
        Self {
            stage,
            source: source.into(),
            entry_point: "main".to_owned(),
        }
    }
}

/// Reflected uniform/storage block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub size: u64,
    pub stages: ShaderStageFlags,
}

/// Reflected combined texture/sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSampler {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Everything needed to create a shader.
#[derive(Debug, Clone, Default)]
pub struct ShaderInfo {
    pub label: Option<String>,
    pub stages: Vec<ShaderStage>,
    /// Declared vertex inputs, matched by name against input assemblers.
    pub attributes: Vec<VertexAttribute>,
    pub blocks: Vec<UniformBlock>,
    pub samplers: Vec<UniformSampler>,
}

impl ShaderInfo {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, stage: ShaderStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_block(mut self, block: UniformBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_sampler(mut self, sampler: UniformSampler) -> Self {
        self.samplers.push(sampler);
        self
    }
}

impl Default for ShaderStage {
    fn default() -> Self {
        Self {
            stage: ShaderStageFlags::VERTEX,
            source: Vec::new(),
            entry_point: "main".to_owned(),
        }
    }
}
