//! Sampler state descriptors.

use super::pipeline::CompareFunc;

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Mipmap filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipFilter {
    /// Sample only the base level.
    None,
    Nearest,
    #[default]
    Linear,
}

/// Addressing mode outside the `[0, 1]` texture coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    Mirror,
    ClampToEdge,
    ClampToBorder,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerInfo {
    /// Debug label.
    pub label: Option<String>,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: MipFilter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    /// 0 or 1 disables anisotropic filtering.
    pub max_anisotropy: u32,
    /// Comparison function for shadow samplers.
    pub compare: Option<CompareFunc>,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            label: None,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: MipFilter::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            address_w: AddressMode::Repeat,
            max_anisotropy: 0,
            compare: None,
        }
    }
}

impl SamplerInfo {
    /// Linear filtering in all dimensions.
    pub fn linear() -> Self {
        Self::default()
    }

    /// Nearest filtering in all dimensions.
    pub fn nearest() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mip_filter: MipFilter::Nearest,
            ..Self::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the addressing mode for all dimensions.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_u = mode;
        self.address_v = mode;
        self.address_w = mode;
        self
    }

    /// Enable depth comparison with the given function.
    pub fn with_compare(mut self, func: CompareFunc) -> Self {
        self.compare = Some(func);
        self
    }
}
