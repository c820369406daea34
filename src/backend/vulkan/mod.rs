//! Vulkan backend built on ash and gpu-allocator.
//!
//! The context owns the instance, device, queue, pools and the side tables
//! mapping frontend handles (semaphore ids, fence ids, command buffer ids)
//! to native objects. Surface and swapchain creation are external; the
//! backend runs headless.

pub(crate) mod conversion;

use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::descriptor::{DescriptorSet, DescriptorSlot};
use crate::error::{GfxError, GfxResult};
use crate::resources::{
    DescriptorSetLayout, Framebuffer, InputAssembler, PipelineState, PipelineStateInfo,
    RenderPass,
};
use crate::sync::{Fence, ResourceAccess, SemaphoreId};
use crate::types::{
    BufferInfo, Color, CommandBufferKind, DrawInfo, MemoryUsage, Rect, SamplerInfo, ShaderInfo,
    TextureInfo, Viewport,
};

use conversion::*;

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";
const FENCE_TIMEOUT_NS: u64 = 10_000_000_000;

type SharedAllocator = Arc<Mutex<Option<Allocator>>>;

pub struct VulkanContext {
    // Keeps the loader alive for the lifetime of everything below.
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue_family: u32,
    queue: Mutex<vk::Queue>,
    allocator: SharedAllocator,
    command_pool: vk::CommandPool,
    descriptor_pool: vk::DescriptorPool,
    /// Native set layouts cached per frontend layout id.
    set_layouts: Mutex<HashMap<u64, vk::DescriptorSetLayout>>,
    semaphores: Mutex<HashMap<u64, vk::Semaphore>>,
    fences: Mutex<HashMap<u64, vk::Fence>>,
    command_buffers: Mutex<HashMap<u64, vk::CommandBuffer>>,
}

impl fmt::Debug for VulkanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanContext")
            .field("queue_family", &self.queue_family)
            .finish_non_exhaustive()
    }
}

impl VulkanContext {
    pub fn new(validation: bool) -> GfxResult<Arc<Self>> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GfxError::InitializationFailed(format!("failed to load Vulkan loader: {e}"))
        })?;

        let validation_available = validation && check_validation_layer_support(&entry);
        if validation && !validation_available {
            log::warn!("validation layers requested but not available");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"prism-gfx")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"prism-gfx")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::make_api_version(0, 1, 2, 0));

        let layer_names: Vec<*const i8> = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
            GfxError::InitializationFailed(format!("failed to create Vulkan instance: {e:?}"))
        })?;

        let physical_device = select_physical_device(&instance)?;
        let queue_family = find_graphics_queue_family(&instance, physical_device)?;
        let device = create_logical_device(&instance, physical_device, queue_family)?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })
        .map_err(|e| {
            GfxError::InitializationFailed(format!("failed to create memory allocator: {e}"))
        })?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
            GfxError::InitializationFailed(format!("failed to create command pool: {e:?}"))
        })?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1024,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: 256,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: 512,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1024,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: 512,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: 256,
            },
        ];
        let descriptor_pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(1024)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = unsafe { device.create_descriptor_pool(&descriptor_pool_info, None) }
            .map_err(|e| {
                GfxError::InitializationFailed(format!("failed to create descriptor pool: {e:?}"))
            })?;

        Ok(Arc::new(Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            queue_family,
            queue: Mutex::new(queue),
            allocator: Arc::new(Mutex::new(Some(allocator))),
            command_pool,
            descriptor_pool,
            set_layouts: Mutex::new(HashMap::new()),
            semaphores: Mutex::new(HashMap::new()),
            fences: Mutex::new(HashMap::new()),
            command_buffers: Mutex::new(HashMap::new()),
        }))
    }

    pub fn create_buffer(&self, info: &BufferInfo) -> GfxResult<VulkanBuffer> {
        let (buffer, allocation) = self.allocate_buffer(info)?;
        Ok(VulkanBuffer {
            device: self.device.clone(),
            raw: Mutex::new((buffer, Some(allocation))),
            allocator: Arc::clone(&self.allocator),
        })
    }

    fn allocate_buffer(&self, info: &BufferInfo) -> GfxResult<(vk::Buffer, Allocation)> {
        let usage =
            convert_buffer_usage(info.usage) | vk::BufferUsageFlags::TRANSFER_DST;
        let location = if info.memory.contains(MemoryUsage::HOST) {
            gpu_allocator::MemoryLocation::CpuToGpu
        } else {
            gpu_allocator::MemoryLocation::GpuOnly
        };

        let buffer_info = vk::BufferCreateInfo::default()
            .size(info.size.max(1))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to create buffer: {e:?}"))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = {
            let mut allocator = self.allocator.lock();
            let allocator = allocator
                .as_mut()
                .ok_or_else(|| GfxError::DeviceLost)?;
            allocator
                .allocate(&AllocationCreateDesc {
                    name: info.label.as_deref().unwrap_or("buffer"),
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    GfxError::ResourceCreationFailed(format!(
                        "failed to allocate buffer memory: {e}"
                    ))
                })?
        };

        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        }
        .map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to bind buffer memory: {e:?}"))
        })?;

        Ok((buffer, allocation))
    }

    /// Swap the buffer's backing storage for a fresh allocation of `size`
    /// bytes. Contents are not preserved.
    pub fn resize_buffer(&self, buffer: &VulkanBuffer, info: &BufferInfo) -> GfxResult<()> {
        let (new_buffer, new_allocation) = self.allocate_buffer(info)?;
        let (old_buffer, old_allocation) = {
            let mut raw = buffer.raw.lock();
            std::mem::replace(&mut *raw, (new_buffer, Some(new_allocation)))
        };
        if let Some(allocation) = old_allocation {
            if let Some(allocator) = self.allocator.lock().as_mut() {
                let _ = allocator.free(allocation);
            }
        }
        unsafe { self.device.destroy_buffer(old_buffer, None) };
        Ok(())
    }

    pub fn create_texture(&self, info: &TextureInfo) -> GfxResult<VulkanTexture> {
        let format = convert_format(info.format);
        let (image_type, view_type) = convert_texture_kind(info.kind);
        let array_layers = match info.kind {
            crate::types::TextureKind::Cube => 6,
            _ => info.array_layers.max(1),
        };
        let flags = match info.kind {
            crate::types::TextureKind::Cube => vk::ImageCreateFlags::CUBE_COMPATIBLE,
            _ => vk::ImageCreateFlags::empty(),
        };

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(format)
            .extent(vk::Extent3D {
                width: info.extent.width,
                height: info.extent.height,
                depth: info.extent.depth.max(1),
            })
            .mip_levels(info.mip_levels)
            .array_layers(array_layers)
            .samples(convert_sample_count(info.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(info.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to create image: {e:?}"))
        })?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = {
            let mut allocator = self.allocator.lock();
            let allocator = allocator.as_mut().ok_or(GfxError::DeviceLost)?;
            allocator
                .allocate(&AllocationCreateDesc {
                    name: info.label.as_deref().unwrap_or("texture"),
                    requirements,
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    GfxError::ResourceCreationFailed(format!(
                        "failed to allocate image memory: {e}"
                    ))
                })?
        };

        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }
        .map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to bind image memory: {e:?}"))
        })?;

        let aspect = if info.format.is_depth() {
            let mut aspect = vk::ImageAspectFlags::DEPTH;
            if info.format.has_stencil() {
                aspect |= vk::ImageAspectFlags::STENCIL;
            }
            aspect
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: info.mip_levels,
                base_array_layer: 0,
                layer_count: array_layers,
            });
        let view = unsafe { self.device.create_image_view(&view_info, None) }.map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to create image view: {e:?}"))
        })?;

        Ok(VulkanTexture {
            device: self.device.clone(),
            image,
            view,
            allocation: Mutex::new(Some(allocation)),
            allocator: Arc::clone(&self.allocator),
        })
    }

    pub fn create_sampler(&self, info: &SamplerInfo) -> GfxResult<VulkanSampler> {
        let mut create_info = vk::SamplerCreateInfo::default()
            .min_filter(convert_filter(info.min_filter))
            .mag_filter(convert_filter(info.mag_filter))
            .mipmap_mode(convert_mip_filter(info.mip_filter))
            .address_mode_u(convert_address_mode(info.address_u))
            .address_mode_v(convert_address_mode(info.address_v))
            .address_mode_w(convert_address_mode(info.address_w))
            .anisotropy_enable(info.max_anisotropy > 1)
            .max_anisotropy(info.max_anisotropy.max(1) as f32)
            .max_lod(vk::LOD_CLAMP_NONE);
        if let Some(compare) = info.compare {
            create_info = create_info
                .compare_enable(true)
                .compare_op(convert_compare_func(compare));
        }
        let sampler = unsafe { self.device.create_sampler(&create_info, None) }.map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to create sampler: {e:?}"))
        })?;
        Ok(VulkanSampler {
            device: self.device.clone(),
            sampler,
        })
    }

    pub fn create_shader(&self, info: &ShaderInfo) -> GfxResult<VulkanShader> {
        let mut modules = Vec::with_capacity(info.stages.len());
        for stage in &info.stages {
            let words = spirv_words(&stage.source).map_err(|e| {
                GfxError::ResourceCreationFailed(format!(
                    "shader {:?}: {e}",
                    info.label.as_deref().unwrap_or("unnamed")
                ))
            })?;
            let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
            let module = unsafe { self.device.create_shader_module(&create_info, None) }
                .map_err(|e| {
                    GfxError::ResourceCreationFailed(format!(
                        "failed to create shader module: {e:?}"
                    ))
                })?;
            modules.push((convert_stage_flags(stage.stage), module));
        }
        Ok(VulkanShader {
            device: self.device.clone(),
            modules,
        })
    }

    pub fn create_render_pass(
        &self,
        info: &crate::types::RenderPassInfo,
    ) -> GfxResult<VulkanRenderPass> {
        let mut attachments = Vec::new();
        let mut color_refs = Vec::new();
        for color in &info.colors {
            color_refs.push(vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert_format(color.format))
                    .samples(convert_sample_count(color.samples))
                    .load_op(convert_load_op(color.load_op))
                    .store_op(convert_store_op(color.store_op))
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
        }
        let depth_ref = info.depth_stencil.as_ref().map(|ds| {
            let reference = vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            };
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert_format(ds.format))
                    .samples(convert_sample_count(ds.samples))
                    .load_op(convert_load_op(ds.depth_load_op))
                    .store_op(convert_store_op(ds.depth_store_op))
                    .stencil_load_op(convert_load_op(ds.stencil_load_op))
                    .stencil_store_op(convert_store_op(ds.stencil_store_op))
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            reference
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = &depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);
        let render_pass = unsafe { self.device.create_render_pass(&create_info, None) }
            .map_err(|e| {
                GfxError::ResourceCreationFailed(format!("failed to create render pass: {e:?}"))
            })?;
        Ok(VulkanRenderPass {
            device: self.device.clone(),
            render_pass,
        })
    }

    pub fn create_framebuffer(
        &self,
        render_pass: &RenderPass,
        colors: &[crate::resources::TextureView],
        depth_stencil: Option<&crate::resources::TextureView>,
        extent: (u32, u32),
    ) -> GfxResult<VulkanFramebuffer> {
        let native_pass = match render_pass.gpu() {
            crate::backend::GpuRenderPass::Vulkan(rp) => rp.render_pass,
            _ => return Err(GfxError::InvalidParameter("backend mismatch".to_owned())),
        };
        let mut views = Vec::new();
        for view in colors.iter().chain(depth_stencil) {
            match view.texture().gpu() {
                crate::backend::GpuTexture::Vulkan(texture) => views.push(texture.view),
                _ => return Err(GfxError::InvalidParameter("backend mismatch".to_owned())),
            }
        }
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(native_pass)
            .attachments(&views)
            .width(extent.0)
            .height(extent.1)
            .layers(1);
        let framebuffer = unsafe { self.device.create_framebuffer(&create_info, None) }
            .map_err(|e| {
                GfxError::ResourceCreationFailed(format!("failed to create framebuffer: {e:?}"))
            })?;
        Ok(VulkanFramebuffer {
            device: self.device.clone(),
            framebuffer,
        })
    }

    /// Native descriptor set layout for `layout`, created on first use.
    fn native_set_layout(&self, layout: &DescriptorSetLayout) -> GfxResult<vk::DescriptorSetLayout> {
        let mut cache = self.set_layouts.lock();
        if let Some(native) = cache.get(&layout.id()) {
            return Ok(*native);
        }
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = layout
            .bindings()
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(convert_descriptor_type(b.ty))
                    .descriptor_count(b.count.max(1))
                    .stage_flags(convert_stage_flags(b.stages))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let native = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| {
                GfxError::ResourceCreationFailed(format!(
                    "failed to create descriptor set layout: {e:?}"
                ))
            })?;
        cache.insert(layout.id(), native);
        Ok(native)
    }

    pub fn create_descriptor_set(
        &self,
        layout: &Arc<DescriptorSetLayout>,
    ) -> GfxResult<VulkanDescriptorSet> {
        let native_layout = self.native_set_layout(layout)?;
        let layouts = [native_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| {
            GfxError::ResourceCreationFailed(format!("failed to allocate descriptor set: {e:?}"))
        })?;
        Ok(VulkanDescriptorSet { set: sets[0] })
    }

    /// Write one slot of a native descriptor set.
    pub fn write_descriptor_slot(
        &self,
        set: &DescriptorSet,
        flat_index: u32,
        slot: &DescriptorSlot,
    ) {
        let crate::backend::GpuDescriptorSet::Vulkan(native) = set.gpu() else {
            return;
        };
        let Some(desc) = set.layout().slot(flat_index) else {
            return;
        };
        let ty = convert_descriptor_type(desc.ty);

        let mut buffer_info = [vk::DescriptorBufferInfo::default()];
        let mut image_info = [vk::DescriptorImageInfo::default()];
        let mut write = vk::WriteDescriptorSet::default()
            .dst_set(native.set)
            .dst_binding(desc.binding)
            .dst_array_element(desc.array_index)
            .descriptor_type(ty);

        if desc.ty.is_buffer() {
            let Some(view) = &slot.buffer else {
                return;
            };
            let crate::backend::GpuBuffer::Vulkan(buffer) = view.buffer().gpu() else {
                return;
            };
            buffer_info[0] = vk::DescriptorBufferInfo {
                buffer: buffer.raw(),
                offset: view.offset(),
                range: view.range(),
            };
            write = write.buffer_info(&buffer_info);
            unsafe { self.device.update_descriptor_sets(&[write], &[]) };
            return;
        }

        let mut info = vk::DescriptorImageInfo::default();
        if let Some(view) = &slot.texture {
            let crate::backend::GpuTexture::Vulkan(texture) = view.texture().gpu() else {
                return;
            };
            info.image_view = texture.view;
            info.image_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        }
        if let Some(sampler) = &slot.sampler {
            let crate::backend::GpuSampler::Vulkan(native_sampler) = sampler.gpu() else {
                return;
            };
            info.sampler = native_sampler.sampler;
        }
        image_info[0] = info;
        write = write.image_info(&image_info);
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    }

    pub fn create_pipeline(&self, info: &PipelineStateInfo) -> GfxResult<VulkanPipeline> {
        let shader = match info.shader.gpu() {
            crate::backend::GpuShader::Vulkan(shader) => shader,
            _ => return Err(GfxError::InvalidParameter("backend mismatch".to_owned())),
        };
        let render_pass = match info.render_pass.gpu() {
            crate::backend::GpuRenderPass::Vulkan(rp) => rp.render_pass,
            _ => return Err(GfxError::InvalidParameter("backend mismatch".to_owned())),
        };

        let mut set_layouts = Vec::new();
        for layout in info.layout.set_layouts() {
            set_layouts.push(self.native_set_layout(layout)?);
        }
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout = unsafe { self.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| {
                GfxError::ResourceCreationFailed(format!(
                    "failed to create pipeline layout: {e:?}"
                ))
            })?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = shader
            .modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(*module)
                    .name(c"main")
            })
            .collect();

        // One binding per vertex stream; attribute offsets are packed in
        // declaration order within each stream.
        let mut bindings: Vec<vk::VertexInputBindingDescription> = Vec::new();
        let mut attributes: Vec<vk::VertexInputAttributeDescription> = Vec::new();
        let mut stream_offsets: HashMap<u32, u32> = HashMap::new();
        for attribute in info.shader.attributes() {
            let offset = stream_offsets.entry(attribute.stream).or_insert(0);
            attributes.push(vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.stream,
                format: convert_format(attribute.format),
                offset: *offset,
            });
            *offset += attribute.format.texel_size();
        }
        for (stream, stride) in &stream_offsets {
            bindings.push(vk::VertexInputBindingDescription {
                binding: *stream,
                stride: *stride,
                input_rate: vk::VertexInputRate::VERTEX,
            });
        }
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(convert_topology(info.topology));

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rs = &info.rasterizer;
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(convert_cull_mode(rs.cull_mode))
            .front_face(if rs.front_face_ccw {
                vk::FrontFace::COUNTER_CLOCKWISE
            } else {
                vk::FrontFace::CLOCKWISE
            })
            .depth_bias_enable(rs.depth_bias != 0.0 || rs.depth_bias_slope != 0.0)
            .depth_bias_constant_factor(rs.depth_bias)
            .depth_bias_slope_factor(rs.depth_bias_slope)
            .line_width(rs.line_width);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let ds = &info.depth_stencil;
        let stencil_op = |face: &crate::types::StencilFaceState| vk::StencilOpState {
            fail_op: convert_stencil_op(face.fail_op),
            pass_op: convert_stencil_op(face.pass_op),
            depth_fail_op: convert_stencil_op(face.depth_fail_op),
            compare_op: convert_compare_func(face.func),
            compare_mask: face.read_mask,
            write_mask: face.write_mask,
            reference: face.reference,
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(ds.depth_test)
            .depth_write_enable(ds.depth_write)
            .depth_compare_op(convert_compare_func(ds.depth_func))
            .stencil_test_enable(ds.front.test || ds.back.test)
            .front(stencil_op(&ds.front))
            .back(stencil_op(&ds.back));

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = info
            .render_pass
            .info()
            .colors
            .iter()
            .enumerate()
            .map(|(index, _)| {
                let target = info
                    .blend
                    .targets
                    .get(index)
                    .copied()
                    .unwrap_or_else(|| info.blend.target0());
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(target.blend)
                    .src_color_blend_factor(convert_blend_factor(target.src_factor))
                    .dst_color_blend_factor(convert_blend_factor(target.dst_factor))
                    .color_blend_op(convert_blend_op(target.op))
                    .src_alpha_blend_factor(convert_blend_factor(target.src_alpha_factor))
                    .dst_alpha_blend_factor(convert_blend_factor(target.dst_alpha_factor))
                    .alpha_blend_op(convert_blend_op(target.alpha_op))
                    .color_write_mask(vk::ColorComponentFlags::from_raw(
                        target.color_mask.bits() as u32,
                    ))
            })
            .collect();
        let blend_color = info.blend.blend_color;
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&blend_attachments)
            .blend_constants([blend_color.r, blend_color.g, blend_color.b, blend_color.a]);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| {
            GfxError::ResourceCreationFailed(format!("failed to create pipeline: {e:?}"))
        })?;

        Ok(VulkanPipeline {
            device: self.device.clone(),
            pipeline: pipelines[0],
            layout: pipeline_layout,
        })
    }

    fn native_command_buffer(&self, id: u64) -> Option<vk::CommandBuffer> {
        self.command_buffers.lock().get(&id).copied()
    }

    pub fn create_command_buffer(&self, id: u64, kind: CommandBufferKind) -> GfxResult<()> {
        let level = match kind {
            CommandBufferKind::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferKind::Secondary => vk::CommandBufferLevel::SECONDARY,
        };
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(level)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(
            |e| {
                GfxError::ResourceCreationFailed(format!(
                    "failed to allocate command buffer: {e:?}"
                ))
            },
        )?;
        self.command_buffers.lock().insert(id, buffers[0]);
        Ok(())
    }

    pub fn release_command_buffer(&self, id: u64) {
        if let Some(cb) = self.command_buffers.lock().remove(&id) {
            unsafe { self.device.free_command_buffers(self.command_pool, &[cb]) };
        }
    }

    pub fn begin_command_buffer(
        &self,
        id: u64,
        kind: CommandBufferKind,
        pass: Option<&RenderPass>,
    ) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let mut flags = vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT;
        let mut inheritance = vk::CommandBufferInheritanceInfo::default();
        if kind == CommandBufferKind::Secondary {
            flags |= vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE;
            if let Some(crate::backend::GpuRenderPass::Vulkan(rp)) = pass.map(|p| p.gpu()) {
                inheritance = inheritance.render_pass(rp.render_pass).subpass(0);
            }
        }
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(flags)
            .inheritance_info(&inheritance);
        unsafe {
            let _ = self.device.reset_command_buffer(cb, vk::CommandBufferResetFlags::empty());
            let _ = self.device.begin_command_buffer(cb, &begin_info);
        }
    }

    pub fn end_command_buffer(&self, id: u64) {
        if let Some(cb) = self.native_command_buffer(id) {
            unsafe {
                let _ = self.device.end_command_buffer(cb);
            }
        }
    }

    /// Emit one batched barrier for everything checked into the tracker
    /// since the last flush. Write accesses get a full memory dependency.
    pub fn cmd_flush_barriers(&self, id: u64, accesses: &[(u64, ResourceAccess)]) {
        if accesses.is_empty() {
            return;
        }
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let any_write = accesses.iter().any(|(_, a)| a.access.is_write());
        let dst_access = if any_write {
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE
        } else {
            vk::AccessFlags::MEMORY_READ
        };
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(dst_access);
        unsafe {
            self.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
    }

    pub fn cmd_begin_render_pass(
        &self,
        id: u64,
        framebuffer: &Framebuffer,
        render_area: Rect,
        clear_colors: &[Color],
        secondaries: bool,
    ) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let crate::backend::GpuFramebuffer::Vulkan(native_fb) = framebuffer.gpu() else {
            return;
        };
        let crate::backend::GpuRenderPass::Vulkan(native_rp) = framebuffer.render_pass().gpu()
        else {
            return;
        };

        let info = framebuffer.render_pass().info();
        let mut clear_values = Vec::new();
        for (index, color) in info.colors.iter().enumerate() {
            let value = clear_colors
                .get(index)
                .copied()
                .unwrap_or(color.clear_color);
            clear_values.push(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [value.r, value.g, value.b, value.a],
                },
            });
        }
        if let Some(ds) = &info.depth_stencil {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: ds.clear_depth,
                    stencil: ds.clear_stencil,
                },
            });
        }

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(native_rp.render_pass)
            .framebuffer(native_fb.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D {
                    x: render_area.x,
                    y: render_area.y,
                },
                extent: vk::Extent2D {
                    width: render_area.width,
                    height: render_area.height,
                },
            })
            .clear_values(&clear_values);
        let contents = if secondaries {
            vk::SubpassContents::SECONDARY_COMMAND_BUFFERS
        } else {
            vk::SubpassContents::INLINE
        };
        unsafe {
            self.device.cmd_begin_render_pass(cb, &begin_info, contents);
        }
    }

    pub fn cmd_end_render_pass(&self, id: u64) {
        if let Some(cb) = self.native_command_buffer(id) {
            unsafe { self.device.cmd_end_render_pass(cb) };
        }
    }

    pub fn cmd_bind_pipeline(&self, id: u64, pipeline: &PipelineState) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let crate::backend::GpuPipeline::Vulkan(native) = pipeline.gpu() else {
            return;
        };
        unsafe {
            self.device
                .cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, native.pipeline);
        }
    }

    /// Bind one set. Native dynamic offsets are ordered by layout, so the
    /// supplied offsets are permuted through the pipeline's resolved map.
    pub fn cmd_bind_descriptor_set(
        &self,
        id: u64,
        pipeline: &PipelineState,
        set_index: u32,
        set: &DescriptorSet,
        dynamic_offsets: &[u64],
    ) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let crate::backend::GpuPipeline::Vulkan(native_pipeline) = pipeline.gpu() else {
            return;
        };
        let crate::backend::GpuDescriptorSet::Vulkan(native_set) = set.gpu() else {
            return;
        };

        let mut native_offsets = Vec::new();
        if let Some(layout) = pipeline.layout().set_layouts().get(set_index as usize) {
            for binding in layout.bindings() {
                if !binding.ty.is_dynamic() {
                    continue;
                }
                let offset = pipeline
                    .dynamic_offset_index(set_index, binding.binding)
                    .and_then(|index| dynamic_offsets.get(index as usize))
                    .copied()
                    .unwrap_or(0);
                native_offsets.push(offset as u32);
            }
        }

        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::GRAPHICS,
                native_pipeline.layout,
                set_index,
                &[native_set.set],
                &native_offsets,
            );
        }
    }

    pub fn cmd_bind_input_assembler(&self, id: u64, ia: &InputAssembler) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let mut buffers = Vec::new();
        let mut offsets = Vec::new();
        for view in ia.vertex_buffers() {
            let crate::backend::GpuBuffer::Vulkan(buffer) = view.buffer().gpu() else {
                return;
            };
            buffers.push(buffer.raw());
            offsets.push(view.offset());
        }
        unsafe {
            self.device.cmd_bind_vertex_buffers(cb, 0, &buffers, &offsets);
        }
        if let Some(view) = ia.index_buffer() {
            let crate::backend::GpuBuffer::Vulkan(buffer) = view.buffer().gpu() else {
                return;
            };
            unsafe {
                self.device.cmd_bind_index_buffer(
                    cb,
                    buffer.raw(),
                    view.offset(),
                    convert_index_format(ia.index_format()),
                );
            }
        }
    }

    pub fn cmd_set_viewport(&self, id: u64, viewport: Viewport) {
        if let Some(cb) = self.native_command_buffer(id) {
            let native = vk::Viewport {
                x: viewport.x as f32,
                y: viewport.y as f32,
                width: viewport.width as f32,
                height: viewport.height as f32,
                min_depth: viewport.min_depth,
                max_depth: viewport.max_depth,
            };
            unsafe { self.device.cmd_set_viewport(cb, 0, &[native]) };
        }
    }

    pub fn cmd_set_scissor(&self, id: u64, scissor: Rect) {
        if let Some(cb) = self.native_command_buffer(id) {
            let native = vk::Rect2D {
                offset: vk::Offset2D {
                    x: scissor.x,
                    y: scissor.y,
                },
                extent: vk::Extent2D {
                    width: scissor.width,
                    height: scissor.height,
                },
            };
            unsafe { self.device.cmd_set_scissor(cb, 0, &[native]) };
        }
    }

    pub fn cmd_draw(&self, id: u64, info: &DrawInfo) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        unsafe {
            if info.is_indexed() {
                self.device.cmd_draw_indexed(
                    cb,
                    info.index_count,
                    info.instances(),
                    info.first_index,
                    info.vertex_offset,
                    info.first_instance,
                );
            } else {
                self.device.cmd_draw(
                    cb,
                    info.vertex_count,
                    info.instances(),
                    info.first_vertex,
                    info.first_instance,
                );
            }
        }
    }

    pub fn cmd_update_buffer(&self, id: u64, buffer: &VulkanBuffer, offset: u64, data: &[u8]) {
        if let Some(cb) = self.native_command_buffer(id) {
            unsafe {
                self.device.cmd_update_buffer(cb, buffer.raw(), offset, data);
            }
        }
    }

    pub fn cmd_execute(&self, id: u64, secondary_ids: &[u64]) {
        let Some(cb) = self.native_command_buffer(id) else {
            return;
        };
        let map = self.command_buffers.lock();
        let secondaries: Vec<vk::CommandBuffer> = secondary_ids
            .iter()
            .filter_map(|sid| map.get(sid).copied())
            .collect();
        drop(map);
        if !secondaries.is_empty() {
            unsafe { self.device.cmd_execute_commands(cb, &secondaries) };
        }
    }

    fn native_semaphore(&self, id: SemaphoreId) -> GfxResult<vk::Semaphore> {
        let mut map = self.semaphores.lock();
        if let Some(native) = map.get(&id.0) {
            return Ok(*native);
        }
        let info = vk::SemaphoreCreateInfo::default();
        let native = unsafe { self.device.create_semaphore(&info, None) }
            .map_err(|e| GfxError::SubmitFailed(format!("semaphore creation failed: {e}")))?;
        map.insert(id.0, native);
        Ok(native)
    }

    fn native_fence(&self, fence: &Fence) -> GfxResult<vk::Fence> {
        let mut map = self.fences.lock();
        match map.get(&fence.id()) {
            Some(native) => {
                let native = *native;
                unsafe {
                    let _ = self.device.reset_fences(&[native]);
                }
                Ok(native)
            }
            None => {
                let info = vk::FenceCreateInfo::default();
                let native = unsafe { self.device.create_fence(&info, None) }
                    .map_err(|e| GfxError::SubmitFailed(format!("fence creation failed: {e}")))?;
                map.insert(fence.id(), native);
                Ok(native)
            }
        }
    }

    pub fn submit(
        &self,
        cb_ids: &[u64],
        wait: Option<SemaphoreId>,
        signal: SemaphoreId,
        fence: Option<&Fence>,
    ) -> GfxResult<()> {
        let map = self.command_buffers.lock();
        let buffers: Vec<vk::CommandBuffer> =
            cb_ids.iter().filter_map(|id| map.get(id).copied()).collect();
        drop(map);

        let wait_semaphores: Vec<vk::Semaphore> = match wait {
            Some(id) => vec![self.native_semaphore(id)?],
            None => Vec::new(),
        };
        let wait_stages = vec![vk::PipelineStageFlags::ALL_COMMANDS; wait_semaphores.len()];
        let signal_semaphores = [self.native_semaphore(signal)?];
        let native_fence = match fence {
            Some(fence) => self.native_fence(fence)?,
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&buffers)
            .signal_semaphores(&signal_semaphores);

        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, &[submit_info], native_fence) }.map_err(
            |e| match e {
                vk::Result::ERROR_DEVICE_LOST => GfxError::DeviceLost,
                e => GfxError::SubmitFailed(format!("vkQueueSubmit failed: {e:?}")),
            },
        )
    }

    /// Block until the submission guarded by `fence` completes, then mirror
    /// the result into the frontend flag.
    pub fn wait_fence(&self, fence: &Fence) {
        let native = {
            let map = self.fences.lock();
            map.get(&fence.id()).copied()
        };
        let Some(native) = native else {
            return;
        };
        unsafe {
            match self.device.wait_for_fences(&[native], true, FENCE_TIMEOUT_NS) {
                Ok(()) => fence.signal(),
                Err(vk::Result::TIMEOUT) => {
                    log::warn!("fence wait timed out, GPU may be hung");
                }
                Err(e) => log::error!("fence wait failed: {e:?}"),
            }
        }
    }

    /// Drop the native object behind a fence the queue has reclaimed. The
    /// frontend id goes back to its pool, so the side table stays bounded.
    pub fn reclaim_fence(&self, fence: &Fence) {
        if let Some(native) = self.fences.lock().remove(&fence.id()) {
            unsafe { self.device.destroy_fence(native, None) };
        }
    }

    pub fn poll_fence(&self, fence: &Fence) -> bool {
        let native = {
            let map = self.fences.lock();
            map.get(&fence.id()).copied()
        };
        match native {
            Some(native) => {
                let signaled = unsafe { self.device.get_fence_status(native) }.unwrap_or(false);
                if signaled {
                    fence.signal();
                }
                signaled
            }
            None => fence.is_signaled(),
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            for (_, cb) in self.command_buffers.get_mut().drain() {
                self.device.free_command_buffers(self.command_pool, &[cb]);
            }
            for (_, semaphore) in self.semaphores.get_mut().drain() {
                self.device.destroy_semaphore(semaphore, None);
            }
            for (_, fence) in self.fences.get_mut().drain() {
                self.device.destroy_fence(fence, None);
            }
            for (_, layout) in self.set_layouts.get_mut().drain() {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_command_pool(self.command_pool, None);

            // Allocator must drop while the device is alive.
            drop(self.allocator.lock().take());

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };
    layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    })
}

/// Prefer discrete GPUs, then integrated, scored by 2D texture limit.
fn select_physical_device(instance: &ash::Instance) -> GfxResult<vk::PhysicalDevice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GfxError::InitializationFailed(format!("failed to enumerate physical devices: {e:?}"))
    })?;
    if devices.is_empty() {
        return Err(GfxError::InitializationFailed(
            "no Vulkan-capable GPU found".to_owned(),
        ));
    }

    let mut best = None;
    let mut best_score = 0u32;
    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let mut score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 10,
        };
        score += properties.limits.max_image_dimension2_d / 1024;

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "found GPU: {:?} (type: {:?}, score: {})",
            name,
            properties.device_type,
            score
        );
        if score > best_score {
            best_score = score;
            best = Some(device);
        }
    }
    best.ok_or_else(|| GfxError::InitializationFailed("no suitable GPU found".to_owned()))
}

fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> GfxResult<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or_else(|| {
            GfxError::InitializationFailed("no graphics queue family found".to_owned())
        })
}

fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> GfxResult<ash::Device> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&queue_priorities)];

    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(true)
        .independent_blend(true);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&features);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
        GfxError::InitializationFailed(format!("failed to create logical device: {e:?}"))
    })
}

/// Reinterpret SPIR-V bytes as words, validating alignment and magic.
fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(format!("SPIR-V length {} is not a multiple of 4", bytes.len()));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != 0x0723_0203 {
        return Err("bad SPIR-V magic number".to_owned());
    }
    Ok(words)
}

pub struct VulkanBuffer {
    device: ash::Device,
    raw: Mutex<(vk::Buffer, Option<Allocation>)>,
    allocator: SharedAllocator,
}

impl VulkanBuffer {
    pub fn raw(&self) -> vk::Buffer {
        self.raw.lock().0
    }

    /// Copy `data` into host-visible backing memory. Fails for
    /// device-local allocations, which have no mapping.
    pub fn write(&self, offset: u64, data: &[u8]) -> GfxResult<()> {
        let mut raw = self.raw.lock();
        let allocation = raw.1.as_mut().ok_or(GfxError::DeviceLost)?;
        let mapped = allocation.mapped_slice_mut().ok_or_else(|| {
            GfxError::InvalidParameter("buffer memory is not host-visible".to_owned())
        })?;
        let offset = offset as usize;
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= mapped.len())
            .ok_or_else(|| {
                GfxError::InvalidParameter("buffer write out of bounds".to_owned())
            })?;
        mapped[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl fmt::Debug for VulkanBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanBuffer").field("raw", &self.raw()).finish()
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        let (buffer, allocation) = {
            let mut raw = self.raw.lock();
            (raw.0, raw.1.take())
        };
        if let Some(allocation) = allocation {
            if let Some(allocator) = self.allocator.lock().as_mut() {
                let _ = allocator.free(allocation);
            }
        }
        unsafe { self.device.destroy_buffer(buffer, None) };
    }
}

pub struct VulkanTexture {
    device: ash::Device,
    pub image: vk::Image,
    pub view: vk::ImageView,
    allocation: Mutex<Option<Allocation>>,
    allocator: SharedAllocator,
}

impl fmt::Debug for VulkanTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanTexture").field("image", &self.image).finish()
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.view, None) };
        if let Some(allocation) = self.allocation.lock().take() {
            if let Some(allocator) = self.allocator.lock().as_mut() {
                let _ = allocator.free(allocation);
            }
        }
        unsafe { self.device.destroy_image(self.image, None) };
    }
}

pub struct VulkanSampler {
    device: ash::Device,
    pub sampler: vk::Sampler,
}

impl fmt::Debug for VulkanSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanSampler").field("sampler", &self.sampler).finish()
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}

pub struct VulkanShader {
    device: ash::Device,
    pub modules: Vec<(vk::ShaderStageFlags, vk::ShaderModule)>,
}

impl fmt::Debug for VulkanShader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanShader")
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        for (_, module) in &self.modules {
            unsafe { self.device.destroy_shader_module(*module, None) };
        }
    }
}

pub struct VulkanRenderPass {
    device: ash::Device,
    pub render_pass: vk::RenderPass,
}

impl fmt::Debug for VulkanRenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanRenderPass")
            .field("render_pass", &self.render_pass)
            .finish()
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe { self.device.destroy_render_pass(self.render_pass, None) };
    }
}

pub struct VulkanFramebuffer {
    device: ash::Device,
    pub framebuffer: vk::Framebuffer,
}

impl fmt::Debug for VulkanFramebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanFramebuffer")
            .field("framebuffer", &self.framebuffer)
            .finish()
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_framebuffer(self.framebuffer, None) };
    }
}

pub struct VulkanPipeline {
    device: ash::Device,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl fmt::Debug for VulkanPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanPipeline")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Allocated from the context's pool; freed wholesale when the pool is
/// destroyed with the context.
#[derive(Debug)]
pub struct VulkanDescriptorSet {
    pub set: vk::DescriptorSet,
}
