//! Command buffer vocabulary.

/// Command buffer level.
///
/// Primary buffers are submitted directly to a queue. Secondary buffers are
/// recorded off the critical path and stitched into a primary's render pass
/// with [`crate::CommandBuffer::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandBufferKind {
    #[default]
    Primary,
    Secondary,
}

/// Parameters of one draw.
///
/// `index_count > 0` selects an indexed draw; otherwise `vertex_count`
/// vertices are drawn directly. `instance_count == 0` is treated as one
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawInfo {
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub index_count: u32,
    pub first_index: u32,
    /// Signed offset added to each fetched index.
    pub vertex_offset: i32,
    pub instance_count: u32,
    pub first_instance: u32,
}

impl DrawInfo {
    /// Non-indexed draw of `vertex_count` vertices.
    pub fn arrays(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            ..Default::default()
        }
    }

    /// Indexed draw of `index_count` indices.
    pub fn indexed(index_count: u32) -> Self {
        Self {
            index_count,
            ..Default::default()
        }
    }

    pub fn with_instances(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }

    /// Effective instance count (zero draws as one).
    pub fn instances(&self) -> u32 {
        self.instance_count.max(1)
    }

    /// Whether this is an indexed draw.
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }
}
