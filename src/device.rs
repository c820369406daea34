//! The device: backend selection, resource creation and uploads.

use std::fmt;
use std::sync::Arc;

use crate::backend::gles::driver::{Attachment, GlesDriver};
use crate::backend::gles::GlesContext;
#[cfg(feature = "vulkan-backend")]
use crate::backend::vulkan::VulkanContext;
use crate::backend::{
    GpuBuffer, GpuDescriptorSet, GpuFramebuffer, GpuInputAssembler, GpuPipeline, GpuRenderPass,
    GpuSampler, GpuShader, GpuTexture,
};
use crate::command::CommandBuffer;
use crate::descriptor::{DescriptorSet, DescriptorSlot};
use crate::error::{GfxError, GfxResult};
use crate::queue::Queue;
use crate::resources::{
    next_resource_id, Buffer, BufferView, DescriptorSetLayout, Framebuffer, InputAssembler,
    PipelineLayout, PipelineState, PipelineStateInfo, RenderPass, Sampler, Shader, Texture,
    TextureView,
};
use crate::sync::AccessTracker;
use crate::types::{
    BufferInfo, BufferUsage, CommandBufferKind, DescriptorSetLayoutBinding, DynamicOffsetPolicy,
    Format, IndexFormat, RenderPassInfo, SamplerInfo, ShaderInfo, TextureInfo, TextureUsage,
    VertexAttribute,
};

/// Which backend to drive and how to reach it.
#[derive(Debug)]
pub enum BackendKind {
    /// OpenGL ES through a caller-supplied driver.
    Gles(Box<dyn GlesDriver>),
    #[cfg(feature = "vulkan-backend")]
    Vulkan,
}

#[derive(Debug)]
pub struct DeviceDescriptor {
    backend: BackendKind,
    validation: bool,
    dynamic_offset_policy: DynamicOffsetPolicy,
}

impl DeviceDescriptor {
    pub fn gles(driver: Box<dyn GlesDriver>) -> Self {
        Self {
            backend: BackendKind::Gles(driver),
            validation: false,
            dynamic_offset_policy: DynamicOffsetPolicy::default(),
        }
    }

    #[cfg(feature = "vulkan-backend")]
    pub fn vulkan() -> Self {
        Self {
            backend: BackendKind::Vulkan,
            validation: false,
            dynamic_offset_policy: DynamicOffsetPolicy::default(),
        }
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_dynamic_offset_policy(mut self, policy: DynamicOffsetPolicy) -> Self {
        self.dynamic_offset_policy = policy;
        self
    }
}

/// Cheap handle to the active backend context.
#[derive(Clone)]
pub(crate) enum BackendRef {
    Gles(Arc<GlesContext>),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(Arc<VulkanContext>),
}

impl fmt::Debug for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gles(_) => f.write_str("BackendRef::Gles"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => f.write_str("BackendRef::Vulkan"),
        }
    }
}

/// Placeholder resources substituted for unbound descriptor slots.
#[derive(Debug)]
pub struct DeviceDefaults {
    pub(crate) buffer: Arc<Buffer>,
    pub(crate) texture: Arc<Texture>,
    pub(crate) sampler: Arc<Sampler>,
}

/// The central object: creates resources, uploads data and owns the queue.
#[derive(Debug)]
pub struct Device {
    backend: BackendRef,
    defaults: DeviceDefaults,
    queue: Queue,
    tracker: AccessTracker,
    dynamic_offset_policy: DynamicOffsetPolicy,
}

impl Device {
    pub fn new(descriptor: DeviceDescriptor) -> GfxResult<Arc<Self>> {
        let backend = match descriptor.backend {
            BackendKind::Gles(driver) => {
                if descriptor.validation {
                    log::debug!("validation requested, relying on driver-side checks");
                }
                BackendRef::Gles(Arc::new(GlesContext::new(driver)))
            }
            #[cfg(feature = "vulkan-backend")]
            BackendKind::Vulkan => BackendRef::Vulkan(VulkanContext::new(descriptor.validation)?),
        };

        let defaults = Self::create_defaults(&backend)?;
        let queue = Queue::new(backend.clone());

        Ok(Arc::new(Self {
            backend,
            defaults,
            queue,
            tracker: AccessTracker::new(),
            dynamic_offset_policy: descriptor.dynamic_offset_policy,
        }))
    }

    fn create_defaults(backend: &BackendRef) -> GfxResult<DeviceDefaults> {
        let buffer_info = BufferInfo::new(256, BufferUsage::UNIFORM)
            .with_label("default-buffer");
        let buffer_gpu = match backend {
            BackendRef::Gles(ctx) => {
                GpuBuffer::Gles(ctx.create_buffer(buffer_info.usage, buffer_info.size))
            }
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuBuffer::Vulkan(ctx.create_buffer(&buffer_info)?),
        };
        let buffer = Arc::new(Buffer::new(&buffer_info, buffer_gpu));

        let texture_info = TextureInfo::new_2d(Format::Rgba8Unorm, 1, 1, TextureUsage::SAMPLED)
            .with_label("default-texture");
        let texture_gpu = match backend {
            BackendRef::Gles(ctx) => GpuTexture::Gles(ctx.create_texture(&texture_info)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuTexture::Vulkan(ctx.create_texture(&texture_info)?),
        };
        let texture = Arc::new(Texture::new(texture_info, texture_gpu));

        let sampler_info = SamplerInfo::default();
        let sampler_gpu = match backend {
            BackendRef::Gles(ctx) => GpuSampler::Gles(ctx.create_sampler(&sampler_info)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuSampler::Vulkan(ctx.create_sampler(&sampler_info)?),
        };
        let sampler = Arc::new(Sampler::new(sampler_info, sampler_gpu));

        Ok(DeviceDefaults {
            buffer,
            texture,
            sampler,
        })
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn dynamic_offset_policy(&self) -> DynamicOffsetPolicy {
        self.dynamic_offset_policy
    }

    pub(crate) fn backend(&self) -> &BackendRef {
        &self.backend
    }

    pub(crate) fn defaults(&self) -> &DeviceDefaults {
        &self.defaults
    }

    pub(crate) fn access_tracker(&self) -> &AccessTracker {
        &self.tracker
    }

    pub fn create_buffer(&self, info: BufferInfo) -> GfxResult<Arc<Buffer>> {
        if info.size == 0 {
            return Err(GfxError::InvalidParameter(format!(
                "buffer {:?}: zero size",
                info.label
            )));
        }
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => GpuBuffer::Gles(ctx.create_buffer(info.usage, info.size)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuBuffer::Vulkan(ctx.create_buffer(&info)?),
        };
        Ok(Arc::new(Buffer::new(&info, gpu)))
    }

    /// Reallocate a buffer's native storage. Contents are not preserved and
    /// every descriptor set referencing the buffer is re-dirtied.
    pub fn resize_buffer(&self, buffer: &Buffer, size: u64) -> GfxResult<()> {
        if size == 0 {
            return Err(GfxError::InvalidParameter(format!(
                "buffer {:?}: resize to zero",
                buffer.label()
            )));
        }
        match (buffer.gpu(), &self.backend) {
            (GpuBuffer::Gles(gles), BackendRef::Gles(ctx)) => ctx.resize_buffer(gles, size),
            #[cfg(feature = "vulkan-backend")]
            (GpuBuffer::Vulkan(vulkan), BackendRef::Vulkan(ctx)) => {
                let info = BufferInfo {
                    label: buffer.label().map(str::to_owned),
                    size,
                    stride: buffer.stride(),
                    usage: buffer.usage(),
                    memory: buffer.memory(),
                };
                ctx.resize_buffer(vulkan, &info)?;
            }
            #[cfg(feature = "vulkan-backend")]
            _ => {
                return Err(GfxError::InvalidParameter(
                    "buffer belongs to another device".to_owned(),
                ))
            }
        }
        buffer.record_resize(size);
        Ok(())
    }

    /// Immediate upload to a buffer, outside any command buffer.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> GfxResult<()> {
        let fits = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= buffer.size());
        if !fits {
            return Err(GfxError::InvalidParameter(format!(
                "buffer {:?}: write [{offset}, {offset}+{}) outside {} bytes",
                buffer.label(),
                data.len(),
                buffer.size()
            )));
        }
        match (buffer.gpu(), &self.backend) {
            (GpuBuffer::Gles(gles), BackendRef::Gles(ctx)) => {
                ctx.update_buffer(gles, offset, data);
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            (GpuBuffer::Vulkan(vulkan), BackendRef::Vulkan(_)) => vulkan.write(offset, data),
            #[cfg(feature = "vulkan-backend")]
            _ => Err(GfxError::InvalidParameter(
                "buffer belongs to another device".to_owned(),
            )),
        }
    }

    pub fn create_texture(&self, info: TextureInfo) -> GfxResult<Arc<Texture>> {
        Texture::validate(&info)?;
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => GpuTexture::Gles(ctx.create_texture(&info)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuTexture::Vulkan(ctx.create_texture(&info)?),
        };
        Ok(Arc::new(Texture::new(info, gpu)))
    }

    pub fn create_sampler(&self, info: SamplerInfo) -> GfxResult<Arc<Sampler>> {
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => GpuSampler::Gles(ctx.create_sampler(&info)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuSampler::Vulkan(ctx.create_sampler(&info)?),
        };
        Ok(Arc::new(Sampler::new(info, gpu)))
    }

    pub fn create_shader(&self, info: ShaderInfo) -> GfxResult<Arc<Shader>> {
        if info.stages.is_empty() {
            return Err(GfxError::InvalidParameter(format!(
                "shader {:?}: no stages",
                info.label
            )));
        }
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => GpuShader::Gles(ctx.create_shader(&info)?),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuShader::Vulkan(ctx.create_shader(&info)?),
        };
        Ok(Arc::new(Shader::new(info, gpu)))
    }

    pub fn create_render_pass(&self, info: RenderPassInfo) -> GfxResult<Arc<RenderPass>> {
        RenderPass::validate(&info)?;
        let gpu = match &self.backend {
            BackendRef::Gles(_) => GpuRenderPass::Gles,
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuRenderPass::Vulkan(ctx.create_render_pass(&info)?),
        };
        Ok(Arc::new(RenderPass::new(info, gpu)))
    }

    pub fn create_framebuffer(
        &self,
        render_pass: Arc<RenderPass>,
        colors: Vec<TextureView>,
        depth_stencil: Option<TextureView>,
    ) -> GfxResult<Arc<Framebuffer>> {
        Framebuffer::validate(&render_pass, &colors, depth_stencil.as_ref())?;
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => {
                let mut attachments = Vec::with_capacity(colors.len() + 1);
                for (index, view) in colors.iter().enumerate() {
                    let Some(texture) = view.texture().gpu().gles() else {
                        return Err(GfxError::InvalidParameter(
                            "texture belongs to another device".to_owned(),
                        ));
                    };
                    attachments.push((
                        Attachment::Color(index as u32),
                        texture.handle,
                        view.info().base_mip,
                    ));
                }
                if let Some(view) = &depth_stencil {
                    let Some(texture) = view.texture().gpu().gles() else {
                        return Err(GfxError::InvalidParameter(
                            "texture belongs to another device".to_owned(),
                        ));
                    };
                    attachments.push((Attachment::DepthStencil, texture.handle, view.info().base_mip));
                }
                GpuFramebuffer::Gles(ctx.create_framebuffer(&attachments))
            }
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                let first = colors.first().or(depth_stencil.as_ref()).ok_or_else(|| {
                    GfxError::InvalidParameter("framebuffer: no attachments".to_owned())
                })?;
                let extent = first.texture().info().extent;
                let mip = first.info().base_mip;
                let size = (
                    (extent.width >> mip).max(1),
                    (extent.height >> mip).max(1),
                );
                GpuFramebuffer::Vulkan(ctx.create_framebuffer(
                    &render_pass,
                    &colors,
                    depth_stencil.as_ref(),
                    size,
                )?)
            }
        };
        Ok(Arc::new(Framebuffer::new(
            render_pass,
            colors,
            depth_stencil,
            gpu,
        )))
    }

    pub fn create_descriptor_set_layout(
        &self,
        bindings: Vec<DescriptorSetLayoutBinding>,
    ) -> GfxResult<Arc<DescriptorSetLayout>> {
        Ok(Arc::new(DescriptorSetLayout::new(bindings)?))
    }

    pub fn create_pipeline_layout(
        &self,
        set_layouts: Vec<Arc<DescriptorSetLayout>>,
    ) -> Arc<PipelineLayout> {
        Arc::new(PipelineLayout::new(set_layouts, self.dynamic_offset_policy))
    }

    pub fn create_descriptor_set(
        &self,
        layout: &Arc<DescriptorSetLayout>,
    ) -> GfxResult<Arc<DescriptorSet>> {
        let gpu = match &self.backend {
            BackendRef::Gles(_) => GpuDescriptorSet::Gles,
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                GpuDescriptorSet::Vulkan(ctx.create_descriptor_set(layout)?)
            }
        };
        Ok(Arc::new(DescriptorSet::new(Arc::clone(layout), gpu)))
    }

    pub fn create_pipeline_state(
        &self,
        info: PipelineStateInfo,
    ) -> GfxResult<Arc<PipelineState>> {
        let gpu = match &self.backend {
            BackendRef::Gles(_) => GpuPipeline::Gles,
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => GpuPipeline::Vulkan(ctx.create_pipeline(&info)?),
        };
        Ok(Arc::new(PipelineState::new(info, gpu)))
    }

    pub fn create_input_assembler(
        &self,
        attributes: Vec<VertexAttribute>,
        vertex_buffers: Vec<BufferView>,
        index_buffer: Option<BufferView>,
        index_format: IndexFormat,
    ) -> GfxResult<Arc<InputAssembler>> {
        InputAssembler::validate(&attributes, &vertex_buffers, index_buffer.as_ref())?;
        let id = next_resource_id();
        let gpu = match &self.backend {
            BackendRef::Gles(ctx) => GpuInputAssembler::Gles(ctx.register_input_assembler(id)),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(_) => GpuInputAssembler::Vulkan,
        };
        Ok(Arc::new(InputAssembler::new(
            id,
            attributes,
            vertex_buffers,
            index_buffer,
            index_format,
            gpu,
        )))
    }

    pub fn create_command_buffer(
        self: &Arc<Self>,
        kind: CommandBufferKind,
    ) -> GfxResult<CommandBuffer> {
        let id = next_resource_id();
        #[cfg(feature = "vulkan-backend")]
        if let BackendRef::Vulkan(ctx) = &self.backend {
            ctx.create_command_buffer(id, kind)?;
        }
        Ok(CommandBuffer::new(Arc::clone(self), id, kind))
    }

    /// Push one descriptor slot to the native set. A no-op on GLES, where
    /// bindings are applied from the shadow state at bind time.
    pub(crate) fn write_descriptor_slot(
        &self,
        set: &DescriptorSet,
        flat_index: u32,
        slot: &DescriptorSlot,
    ) {
        match &self.backend {
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.write_descriptor_slot(set, flat_index, slot),
        }
    }

    /// Block until the submission guarded by `fence` has completed.
    pub fn wait_fence(&self, fence: &crate::sync::Fence) {
        match &self.backend {
            // GLES submissions complete synchronously.
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.wait_fence(fence),
        }
    }

    /// Non-blocking check of the submission guarded by `fence`.
    pub fn poll_fence(&self, fence: &crate::sync::Fence) -> bool {
        match &self.backend {
            BackendRef::Gles(_) => fence.is_signaled(),
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.poll_fence(fence),
        }
    }
}
