//! Descriptor set layout vocabulary.

use super::shader::ShaderStageFlags;

/// Kind of resource a descriptor slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    DynamicUniformBuffer,
    StorageBuffer,
    DynamicStorageBuffer,
    SampledTexture,
    StorageTexture,
    Sampler,
    /// Combined texture and sampler in one slot.
    CombinedSampledTexture,
}

impl DescriptorType {
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer
                | Self::DynamicUniformBuffer
                | Self::StorageBuffer
                | Self::DynamicStorageBuffer
        )
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::SampledTexture | Self::StorageTexture | Self::CombinedSampledTexture
        )
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler | Self::CombinedSampledTexture)
    }

    /// Dynamic buffers consume an entry in the dynamic-offset table.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::DynamicUniformBuffer | Self::DynamicStorageBuffer)
    }
}

/// One binding slot in a descriptor set layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    /// Array size; flattened into `count` consecutive descriptors.
    pub count: u32,
    pub stages: ShaderStageFlags,
}

impl DescriptorSetLayoutBinding {
    pub fn new(binding: u32, ty: DescriptorType, stages: ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            count: 1,
            stages,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }
}
