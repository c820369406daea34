//! prism-gfx is a thin hardware abstraction over GPU APIs.
//!
//! Resources (buffers, textures, shaders, pipelines) are created through a
//! [`Device`] and recorded into [`CommandBuffer`]s, which the [`Queue`]
//! turns into ordered GPU submissions. Two backends ship: OpenGL ES driven
//! through the [`backend::gles::driver::GlesDriver`] seam, and Vulkan
//! behind the `vulkan-backend` feature.
//!
//! ```no_run
//! use prism_gfx::{DeviceDescriptor, RecordingDriver};
//!
//! let device = prism_gfx::Device::new(
//!     DeviceDescriptor::gles(Box::new(RecordingDriver::new())),
//! )?;
//! # Ok::<(), prism_gfx::GfxError>(())
//! ```

pub mod backend;
mod command;
pub mod descriptor;
mod device;
mod error;
mod queue;
pub mod resources;
mod swapchain;
pub mod sync;
pub mod types;

pub use backend::gles::driver::{CallLog, GlesCall, GlesCapabilities, GlesDriver, RecordingDriver};
pub use command::{CommandBuffer, CommandBufferStats};
pub use descriptor::{DescriptorSet, DescriptorSlot};
pub use device::{BackendKind, Device, DeviceDescriptor};
pub use error::{GfxError, GfxResult};
pub use queue::{Queue, QueueTotals, Submission};
pub use resources::{
    Buffer, BufferView, DescriptorSetLayout, Framebuffer, InputAssembler, PipelineLayout,
    PipelineState, PipelineStateInfo, RenderPass, Sampler, Shader, Texture, TextureView,
};
pub use swapchain::{HeadlessSwapchain, Swapchain};
pub use sync::{Fence, SemaphoreId};
pub use types::*;
