//! Buffer usage flags and creation descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect-draw argument buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be the source of a transfer.
        const TRANSFER_SRC = 1 << 5;
        /// Buffer can be the destination of a transfer.
        const TRANSFER_DST = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Memory-locality hint for buffers and textures.
    ///
    /// The allocator collaborator decides actual placement; this is the
    /// caller's intent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryUsage: u32 {
        /// Resource lives in device-local memory.
        const DEVICE = 1 << 0;
        /// Resource is host-visible for CPU writes.
        const HOST = 1 << 1;
    }
}

impl Default for MemoryUsage {
    fn default() -> Self {
        Self::DEVICE
    }
}

/// Index element width for index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferInfo {
    /// Debug label.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Element stride in bytes; 0 means "unstructured" and is treated as 1
    /// for element-count purposes.
    pub stride: u64,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Memory-locality hint.
    pub memory: MemoryUsage,
}

impl BufferInfo {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            stride: 0,
            usage,
            memory: MemoryUsage::DEVICE,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the element stride.
    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride;
        self
    }

    /// Set the memory-locality hint.
    pub fn with_memory(mut self, memory: MemoryUsage) -> Self {
        self.memory = memory;
        self
    }

    /// Number of elements given the current size and stride.
    pub fn count(&self) -> u64 {
        self.size / self.stride.max(1)
    }
}
