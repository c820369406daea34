//! Samplers.

use crate::backend::GpuSampler;
use crate::types::SamplerInfo;

use super::next_resource_id;

#[derive(Debug)]
pub struct Sampler {
    id: u64,
    info: SamplerInfo,
    gpu: GpuSampler,
}

impl Sampler {
    pub(crate) fn new(info: SamplerInfo, gpu: GpuSampler) -> Self {
        Self {
            id: next_resource_id(),
            info,
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &SamplerInfo {
        &self.info
    }

    pub(crate) fn gpu(&self) -> &GpuSampler {
        &self.gpu
    }
}
