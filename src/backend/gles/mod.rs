//! GL-family backend.
//!
//! Commands execute immediately at record time against a per-device state
//! cache. See [`cache::GlesStateCache`] for the redundancy-elimination
//! mirror and [`driver::GlesDriver`] for the native-call seam.

pub mod cache;
pub mod commands;
pub mod driver;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{GfxError, GfxResult};
use crate::types::{BufferUsage, SamplerInfo, ShaderInfo, TextureInfo};

use cache::GlesStateCache;
use driver::{BufferTarget, GlesCapabilities, GlesDriver};

/// Shared GL context state: the driver, the state cache and the VAO memo.
#[derive(Debug)]
pub struct GlesContext {
    driver: Box<dyn GlesDriver>,
    capabilities: GlesCapabilities,
    pub(crate) cache: Mutex<GlesStateCache>,
    /// VAOs memoized per (input assembler id, shader program) pairing.
    vao_map: Mutex<HashMap<(u64, u32), u32>>,
}

impl GlesContext {
    pub fn new(driver: Box<dyn GlesDriver>) -> Self {
        let capabilities = driver.capabilities();
        log::info!(
            "gles context: vao={} texture_units={} ubo_bindings={}",
            capabilities.vertex_array_objects,
            capabilities.texture_units,
            capabilities.uniform_buffer_bindings
        );
        Self {
            driver,
            capabilities,
            cache: Mutex::new(GlesStateCache::new(&capabilities)),
            vao_map: Mutex::new(HashMap::new()),
        }
    }

    pub fn driver(&self) -> &dyn GlesDriver {
        self.driver.as_ref()
    }

    pub fn capabilities(&self) -> &GlesCapabilities {
        &self.capabilities
    }

    /// Forget all cached state, as after context loss or external GL use.
    pub fn reset_cache(&self) {
        self.cache.lock().reset(&self.capabilities);
    }

    /// GL binding target for a buffer with `usage`.
    pub(crate) fn buffer_target(usage: BufferUsage) -> BufferTarget {
        if usage.contains(BufferUsage::INDEX) {
            BufferTarget::ElementArray
        } else if usage.contains(BufferUsage::UNIFORM) {
            BufferTarget::Uniform
        } else if usage.contains(BufferUsage::STORAGE) {
            BufferTarget::ShaderStorage
        } else {
            BufferTarget::Array
        }
    }

    /// Bind `handle` to `target` through the cache so redundant binds are
    /// elided. Element-array binds detach the VAO first, since that binding
    /// is VAO state.
    fn bind_buffer_cached(&self, target: BufferTarget, handle: u32) {
        let mut cache = self.cache.lock();
        match target {
            BufferTarget::Array => {
                if cache.array_buffer != handle {
                    self.driver.bind_buffer(target, handle);
                    cache.array_buffer = handle;
                }
            }
            BufferTarget::ElementArray => {
                if cache.vao != 0 {
                    self.driver.bind_vertex_array(0);
                    cache.vao = 0;
                    cache.element_buffer = 0;
                }
                if cache.element_buffer != handle {
                    self.driver.bind_buffer(target, handle);
                    cache.element_buffer = handle;
                }
            }
            BufferTarget::Uniform | BufferTarget::ShaderStorage => {
                self.driver.bind_buffer(target, handle);
            }
        }
    }

    pub(crate) fn create_buffer(self: &Arc<Self>, usage: BufferUsage, size: u64) -> GlesBuffer {
        let target = Self::buffer_target(usage);
        let handle = self.driver.create_buffer();
        if size > 0 {
            self.bind_buffer_cached(target, handle);
            self.driver.buffer_data(target, handle, size);
        }
        GlesBuffer {
            handle,
            target,
            ctx: Arc::clone(self),
        }
    }

    /// Reallocate backing storage. Contents are not preserved.
    pub(crate) fn resize_buffer(&self, buffer: &GlesBuffer, size: u64) {
        self.bind_buffer_cached(buffer.target, buffer.handle);
        self.driver.buffer_data(buffer.target, buffer.handle, size);
    }

    pub(crate) fn update_buffer(&self, buffer: &GlesBuffer, offset: u64, data: &[u8]) {
        self.bind_buffer_cached(buffer.target, buffer.handle);
        self.driver
            .buffer_sub_data(buffer.target, buffer.handle, offset, data);
    }

    pub(crate) fn create_texture(self: &Arc<Self>, info: &TextureInfo) -> GlesTexture {
        let handle = self.driver.create_texture();
        self.driver.texture_storage(
            handle,
            info.extent.width,
            info.extent.height,
            info.mip_levels,
        );
        GlesTexture {
            handle,
            ctx: Arc::clone(self),
        }
    }

    pub(crate) fn create_sampler(self: &Arc<Self>, info: &SamplerInfo) -> GlesSampler {
        let handle = self.driver.create_sampler();
        self.driver.sampler_parameters(handle, info);
        GlesSampler {
            handle,
            ctx: Arc::clone(self),
        }
    }

    /// Compile a shader and assign its native uniform-block bindings and
    /// texture units in reflection order.
    pub(crate) fn create_shader(self: &Arc<Self>, info: &ShaderInfo) -> GfxResult<GlesShader> {
        let label = info.label.as_deref().unwrap_or("shader");
        let program = self.driver.create_program(label);

        let mut block_bindings = Vec::with_capacity(info.blocks.len());
        for (index, block) in info.blocks.iter().enumerate() {
            let binding = index as u32;
            if binding >= self.capabilities.uniform_buffer_bindings {
                self.driver.delete_program(program);
                return Err(GfxError::ResourceCreationFailed(format!(
                    "shader {label:?}: uniform block {:?} exceeds the {} binding slots",
                    block.name, self.capabilities.uniform_buffer_bindings
                )));
            }
            block_bindings.push(binding);
        }

        let mut sampler_units = Vec::with_capacity(info.samplers.len());
        let mut next_unit = 0u32;
        for sampler in &info.samplers {
            let count = sampler.count.max(1);
            if next_unit + count > self.capabilities.texture_units {
                self.driver.delete_program(program);
                return Err(GfxError::ResourceCreationFailed(format!(
                    "shader {label:?}: sampler {:?} exceeds the {} texture units",
                    sampler.name, self.capabilities.texture_units
                )));
            }
            sampler_units.push(next_unit);
            next_unit += count;
        }

        Ok(GlesShader {
            program,
            block_bindings,
            sampler_units,
            ctx: Arc::clone(self),
        })
    }

    pub(crate) fn create_framebuffer(
        self: &Arc<Self>,
        attachments: &[(driver::Attachment, u32, u32)],
    ) -> GlesFramebuffer {
        let handle = self.driver.create_framebuffer();
        {
            let mut cache = self.cache.lock();
            if cache.framebuffer != handle {
                self.driver.bind_framebuffer(handle);
                cache.framebuffer = handle;
            }
        }
        for (attachment, texture, mip) in attachments {
            self.driver.framebuffer_texture(*attachment, *texture, *mip);
        }
        GlesFramebuffer {
            handle,
            ctx: Arc::clone(self),
        }
    }

    pub(crate) fn register_input_assembler(self: &Arc<Self>, id: u64) -> GlesInputAssembler {
        GlesInputAssembler {
            id,
            ctx: Arc::clone(self),
        }
    }

    fn destroy_buffer(&self, buffer: &GlesBuffer) {
        self.cache.lock().forget_buffer(buffer.handle);
        self.driver.delete_buffer(buffer.handle);
    }

    fn destroy_texture(&self, texture: &GlesTexture) {
        self.cache.lock().forget_texture(texture.handle);
        self.driver.delete_texture(texture.handle);
    }

    fn destroy_sampler(&self, sampler: &GlesSampler) {
        self.cache.lock().forget_sampler(sampler.handle);
        self.driver.delete_sampler(sampler.handle);
    }

    fn destroy_shader(&self, shader: &GlesShader) {
        self.cache.lock().forget_program(shader.program);
        // VAOs are memoized per program; drop every pairing that used it.
        let mut map = self.vao_map.lock();
        map.retain(|(_, program), vao| {
            if *program == shader.program {
                self.driver.delete_vertex_array(*vao);
                false
            } else {
                true
            }
        });
        self.driver.delete_program(shader.program);
    }

    fn destroy_framebuffer(&self, framebuffer: &GlesFramebuffer) {
        let mut cache = self.cache.lock();
        if cache.framebuffer == framebuffer.handle {
            cache.framebuffer = 0;
        }
        drop(cache);
        self.driver.delete_framebuffer(framebuffer.handle);
    }

    fn destroy_input_assembler(&self, ia: &GlesInputAssembler) {
        let mut map = self.vao_map.lock();
        let mut cache = self.cache.lock();
        map.retain(|(id, _), vao| {
            if *id == ia.id {
                if cache.vao == *vao {
                    cache.vao = 0;
                }
                self.driver.delete_vertex_array(*vao);
                false
            } else {
                true
            }
        });
    }
}

/// GL buffer object.
#[derive(Debug)]
pub struct GlesBuffer {
    pub handle: u32,
    pub target: BufferTarget,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesBuffer {
    fn drop(&mut self) {
        self.ctx.destroy_buffer(self);
    }
}

/// GL texture object.
#[derive(Debug)]
pub struct GlesTexture {
    pub handle: u32,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesTexture {
    fn drop(&mut self) {
        self.ctx.destroy_texture(self);
    }
}

/// GL sampler object.
#[derive(Debug)]
pub struct GlesSampler {
    pub handle: u32,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesSampler {
    fn drop(&mut self) {
        self.ctx.destroy_sampler(self);
    }
}

/// Linked GL program plus the native slots assigned to its reflection.
#[derive(Debug)]
pub struct GlesShader {
    pub program: u32,
    /// Native uniform-buffer binding per reflected block, in order.
    pub block_bindings: Vec<u32>,
    /// First texture unit per reflected sampler, in order. Arrays occupy
    /// consecutive units.
    pub sampler_units: Vec<u32>,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesShader {
    fn drop(&mut self) {
        self.ctx.destroy_shader(self);
    }
}

/// GL framebuffer object.
#[derive(Debug)]
pub struct GlesFramebuffer {
    pub handle: u32,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesFramebuffer {
    fn drop(&mut self) {
        self.ctx.destroy_framebuffer(self);
    }
}

/// Ticket for an input assembler's VAO memoizations.
#[derive(Debug)]
pub struct GlesInputAssembler {
    pub id: u64,
    ctx: Arc<GlesContext>,
}

impl Drop for GlesInputAssembler {
    fn drop(&mut self) {
        self.ctx.destroy_input_assembler(self);
    }
}
