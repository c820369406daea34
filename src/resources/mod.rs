//! GPU resource objects.
//!
//! Resources are created by the [`crate::Device`], shared via `Arc`, and own
//! an opaque backend payload that releases the native object on drop. Views
//! hold an `Arc` to their parent, so a view can never outlive the native
//! handle it slices.

mod buffer;
mod framebuffer;
mod input_assembler;
mod pipeline;
mod render_pass;
mod sampler;
mod shader;
mod texture;

pub use buffer::{Buffer, BufferView};
pub use framebuffer::Framebuffer;
pub use input_assembler::InputAssembler;
pub use pipeline::{DescriptorSetLayout, PipelineLayout, PipelineState, PipelineStateInfo};
pub use render_pass::RenderPass;
pub use sampler::Sampler;
pub use shader::Shader;
pub use texture::{Texture, TextureView};

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Crate-unique resource id. Ids are never reused, which keeps them safe as
/// cache keys and access-tracker keys.
pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}
