//! Texture formats, usage flags and creation descriptors.

use bitflags::bitflags;

use super::common::Extent3d;

/// Pixel formats understood by the HAL.
///
/// A deliberately modest set; backends report creation errors for formats
/// the hardware cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown,
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Depth16Unorm,
    Depth32Float,
    Depth24UnormStencil8,
    Depth32FloatStencil8,
}

impl Format {
    /// Whether this format has a depth component.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth32Float
                | Self::Depth24UnormStencil8
                | Self::Depth32FloatStencil8
        )
    }

    /// Whether this format has a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8)
    }

    /// Bytes per texel for uncompressed formats, 0 for `Unknown`.
    pub fn texel_size(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Float | Self::Depth16Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Bgra8Unorm
            | Self::Bgra8Srgb
            | Self::Rg16Float
            | Self::R32Float
            | Self::R32Uint
            | Self::Depth32Float
            | Self::Depth24UnormStencil8 => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    D2,
    D2Array,
    D3,
    Cube,
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be the source of a transfer.
        const TRANSFER_SRC = 1 << 0;
        /// Texture can be the destination of a transfer.
        const TRANSFER_DST = 1 << 1;
        /// Texture can be sampled in shaders.
        const SAMPLED = 1 << 2;
        /// Texture can be read/written as a storage image.
        const STORAGE = 1 << 3;
        /// Texture can be a color attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// Texture can be a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        /// Texture can be an input attachment.
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// MSAA sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl SampleCount {
    /// Sample count as an integer.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureInfo {
    /// Debug label.
    pub label: Option<String>,
    pub kind: TextureKind,
    pub format: Format,
    pub extent: Extent3d,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub usage: TextureUsage,
}

impl TextureInfo {
    /// Create a descriptor for a 2D texture.
    pub fn new_2d(format: Format, width: u32, height: u32, usage: TextureUsage) -> Self {
        Self {
            label: None,
            kind: TextureKind::D2,
            format,
            extent: Extent3d::new_2d(width, height),
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::X1,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Set the array layer count (and switch to an array kind for 2D).
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        if self.kind == TextureKind::D2 && array_layers > 1 {
            self.kind = TextureKind::D2Array;
        }
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: SampleCount) -> Self {
        self.samples = samples;
        self
    }
}

/// Mip/layer sub-range selected by a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewInfo {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl Default for TextureViewInfo {
    fn default() -> Self {
        Self {
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        }
    }
}

impl TextureViewInfo {
    /// View covering the whole of the given texture.
    pub fn full(info: &TextureInfo) -> Self {
        Self {
            base_mip: 0,
            mip_count: info.mip_levels,
            base_layer: 0,
            layer_count: info.array_layers,
        }
    }
}
