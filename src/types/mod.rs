//! The fixed type vocabulary consumed by the HAL.
//!
//! Formats, usage bitmasks and fixed-function state descriptions are treated
//! as a stable, externally defined schema: the core records and compares
//! these values but never extends them. Backends translate them to native
//! enums at the driver seam.

pub mod buffer;
pub mod command;
pub mod common;
pub mod descriptor;
pub mod pipeline;
pub mod renderpass;
pub mod sampler;
pub mod shader;
pub mod texture;

pub use buffer::{BufferInfo, BufferUsage, IndexFormat, MemoryUsage};
pub use command::{CommandBufferKind, DrawInfo};
pub use common::{Color, Extent3d, Rect, Viewport};
pub use descriptor::{DescriptorSetLayoutBinding, DescriptorType};
pub use pipeline::{
    BlendFactor, BlendOp, BlendState, BlendTarget, ColorMask, CompareFunc, CullMode,
    DepthStencilState, DynamicOffsetPolicy, PrimitiveTopology, RasterizerState, StencilFace,
    StencilFaceState, StencilOp, VertexAttribute,
};
pub use renderpass::{
    ColorAttachmentDesc, DepthStencilAttachmentDesc, LoadOp, RenderPassInfo, StoreOp,
};
pub use sampler::{AddressMode, Filter, MipFilter, SamplerInfo};
pub use shader::{ShaderInfo, ShaderStage, ShaderStageFlags, UniformBlock, UniformSampler};
pub use texture::{Format, SampleCount, TextureInfo, TextureKind, TextureUsage, TextureViewInfo};
