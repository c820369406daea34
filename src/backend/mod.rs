//! Backend payloads and contexts.
//!
//! Every frontend resource owns one opaque payload enum from this module.
//! The GL-family backend is always compiled; it reaches native code only
//! through the [`gles::GlesDriver`] seam. The Vulkan backend is feature
//! gated behind `vulkan-backend`.

pub mod gles;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

/// Native payload of a buffer.
#[derive(Debug)]
pub enum GpuBuffer {
    Gles(gles::GlesBuffer),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanBuffer),
}

impl GpuBuffer {
    pub(crate) fn gles(&self) -> Option<&gles::GlesBuffer> {
        match self {
            Self::Gles(buffer) => Some(buffer),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}

/// Native payload of a texture.
#[derive(Debug)]
pub enum GpuTexture {
    Gles(gles::GlesTexture),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanTexture),
}

impl GpuTexture {
    pub(crate) fn gles(&self) -> Option<&gles::GlesTexture> {
        match self {
            Self::Gles(texture) => Some(texture),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}

/// Native payload of a sampler.
#[derive(Debug)]
pub enum GpuSampler {
    Gles(gles::GlesSampler),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanSampler),
}

impl GpuSampler {
    pub(crate) fn gles(&self) -> Option<&gles::GlesSampler> {
        match self {
            Self::Gles(sampler) => Some(sampler),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}

/// Native payload of a shader.
#[derive(Debug)]
pub enum GpuShader {
    Gles(gles::GlesShader),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanShader),
}

impl GpuShader {
    pub(crate) fn gles(&self) -> Option<&gles::GlesShader> {
        match self {
            Self::Gles(shader) => Some(shader),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}

/// Native payload of a render pass. The GL-family backend has no native
/// render pass object; load/store ops are applied at begin/end.
#[derive(Debug)]
pub enum GpuRenderPass {
    Gles,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanRenderPass),
}

/// Native payload of a framebuffer. Handle 0 is the default framebuffer.
#[derive(Debug)]
pub enum GpuFramebuffer {
    Gles(gles::GlesFramebuffer),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanFramebuffer),
}

impl GpuFramebuffer {
    pub(crate) fn gles(&self) -> Option<&gles::GlesFramebuffer> {
        match self {
            Self::Gles(framebuffer) => Some(framebuffer),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}

/// Native payload of a pipeline. The GL-family backend derives everything
/// from the shader program plus cached fixed-function state.
#[derive(Debug)]
pub enum GpuPipeline {
    Gles,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanPipeline),
}

/// Native payload of a descriptor set. GL has no native descriptor objects;
/// binding happens against the reflected shader at draw-encode time.
#[derive(Debug)]
pub enum GpuDescriptorSet {
    Gles,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanDescriptorSet),
}

/// Native payload of an input assembler.
#[derive(Debug)]
pub enum GpuInputAssembler {
    Gles(gles::GlesInputAssembler),
    #[cfg(feature = "vulkan-backend")]
    Vulkan,
}

impl GpuInputAssembler {
    pub(crate) fn gles(&self) -> Option<&gles::GlesInputAssembler> {
        match self {
            Self::Gles(ia) => Some(ia),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }
}
