//! Input assemblers.

use parking_lot::RwLock;

use crate::backend::GpuInputAssembler;
use crate::error::{GfxError, GfxResult};
use crate::types::{BufferUsage, DrawInfo, IndexFormat, VertexAttribute};

use super::buffer::BufferView;

/// Vertex attribute streams plus an optional index stream, with a mutable
/// default [`DrawInfo`] derived from the attached buffers.
#[derive(Debug)]
pub struct InputAssembler {
    id: u64,
    attributes: Vec<VertexAttribute>,
    vertex_buffers: Vec<BufferView>,
    index_buffer: Option<BufferView>,
    index_format: IndexFormat,
    draw_info: RwLock<DrawInfo>,
    gpu: GpuInputAssembler,
}

impl InputAssembler {
    pub(crate) fn validate(
        attributes: &[VertexAttribute],
        vertex_buffers: &[BufferView],
        index_buffer: Option<&BufferView>,
    ) -> GfxResult<()> {
        if vertex_buffers.is_empty() {
            return Err(GfxError::InvalidParameter(
                "input assembler: no vertex buffers".to_owned(),
            ));
        }
        for attribute in attributes {
            if attribute.stream as usize >= vertex_buffers.len() {
                return Err(GfxError::InvalidParameter(format!(
                    "input assembler: attribute {:?} reads stream {}, only {} attached",
                    attribute.name,
                    attribute.stream,
                    vertex_buffers.len()
                )));
            }
        }
        for view in vertex_buffers {
            if !view.buffer().usage().contains(BufferUsage::VERTEX) {
                return Err(GfxError::InvalidParameter(format!(
                    "input assembler: buffer {:?} lacks VERTEX usage",
                    view.buffer().label()
                )));
            }
        }
        if let Some(view) = index_buffer {
            if !view.buffer().usage().contains(BufferUsage::INDEX) {
                return Err(GfxError::InvalidParameter(format!(
                    "input assembler: buffer {:?} lacks INDEX usage",
                    view.buffer().label()
                )));
            }
        }
        Ok(())
    }

    /// `id` is allocated by the device so the backend payload can share it.
    pub(crate) fn new(
        id: u64,
        attributes: Vec<VertexAttribute>,
        vertex_buffers: Vec<BufferView>,
        index_buffer: Option<BufferView>,
        index_format: IndexFormat,
        gpu: GpuInputAssembler,
    ) -> Self {
        let draw_info = match &index_buffer {
            Some(view) => DrawInfo::indexed((view.range() / index_format.size() as u64) as u32),
            None => {
                let first = &vertex_buffers[0];
                DrawInfo::arrays(first.buffer().count() as u32)
            }
        };
        Self {
            id,
            attributes,
            vertex_buffers,
            index_buffer,
            index_format,
            draw_info: RwLock::new(draw_info),
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn vertex_buffers(&self) -> &[BufferView] {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<&BufferView> {
        self.index_buffer.as_ref()
    }

    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    pub fn draw_info(&self) -> DrawInfo {
        *self.draw_info.read()
    }

    pub fn set_draw_info(&self, info: DrawInfo) {
        *self.draw_info.write() = info;
    }

    pub(crate) fn gpu(&self) -> &GpuInputAssembler {
        &self.gpu
    }
}
