//! Buffers and buffer views.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::GpuBuffer;
use crate::descriptor::hub::ObserverList;
use crate::error::{GfxError, GfxResult};
use crate::types::{BufferInfo, BufferUsage, MemoryUsage};

use super::next_resource_id;

#[derive(Debug)]
struct BufferState {
    size: u64,
    count: u64,
    /// Bumped on every native reallocation so stale descriptor entries can
    /// be detected by comparing generations.
    generation: u64,
}

/// A GPU buffer. Size and element count are mutable through
/// [`crate::Device::resize_buffer`]; resizing does not preserve contents.
#[derive(Debug)]
pub struct Buffer {
    id: u64,
    label: Option<String>,
    usage: BufferUsage,
    memory: MemoryUsage,
    stride: u64,
    state: RwLock<BufferState>,
    gpu: GpuBuffer,
    observers: ObserverList,
}

impl Buffer {
    pub(crate) fn new(info: &BufferInfo, gpu: GpuBuffer) -> Self {
        Self {
            id: next_resource_id(),
            label: info.label.clone(),
            usage: info.usage,
            memory: info.memory,
            stride: info.stride.max(1),
            state: RwLock::new(BufferState {
                size: info.size,
                count: info.size / info.stride.max(1),
                generation: 0,
            }),
            gpu,
            observers: ObserverList::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn memory(&self) -> MemoryUsage {
        self.memory
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    pub fn count(&self) -> u64 {
        self.state.read().count
    }

    /// Incremented on every native reallocation.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    pub(crate) fn observers(&self) -> &ObserverList {
        &self.observers
    }

    /// Record a completed native resize and re-dirty every descriptor set
    /// referencing this buffer.
    pub(crate) fn record_resize(&self, size: u64) {
        {
            let mut state = self.state.write();
            state.size = size;
            state.count = size / self.stride;
            state.generation += 1;
        }
        self.observers.notify();
    }
}

/// A non-owning slice of a [`Buffer`]. Cheap to clone; the `Arc` keeps the
/// parent (and its native handle) alive for the view's lifetime.
#[derive(Debug, Clone)]
pub struct BufferView {
    buffer: Arc<Buffer>,
    offset: u64,
    range: u64,
    id: u64,
}

impl BufferView {
    /// View of `range` bytes starting at `offset`. The range must lie within
    /// the buffer at creation time.
    pub fn new(buffer: Arc<Buffer>, offset: u64, range: u64) -> GfxResult<Self> {
        let size = buffer.size();
        if range == 0 || offset.checked_add(range).map_or(true, |end| end > size) {
            return Err(GfxError::InvalidParameter(format!(
                "buffer view [{offset}, {offset}+{range}) outside buffer of {size} bytes"
            )));
        }
        Ok(Self {
            buffer,
            offset,
            range,
            id: next_resource_id(),
        })
    }

    /// View of the whole buffer.
    pub fn whole(buffer: Arc<Buffer>) -> Self {
        let range = buffer.size();
        Self {
            buffer,
            offset: 0,
            range,
            id: next_resource_id(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn range(&self) -> u64 {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::gles::driver::RecordingDriver;
    use crate::backend::gles::GlesContext;
    use crate::backend::GpuBuffer;
    use crate::types::BufferInfo;

    fn test_buffer(size: u64, stride: u64) -> Buffer {
        let ctx = Arc::new(GlesContext::new(Box::new(RecordingDriver::new())));
        let info = BufferInfo::new(size, BufferUsage::VERTEX).with_stride(stride);
        let gpu = GpuBuffer::Gles(ctx.create_buffer(info.usage, info.size));
        Buffer::new(&info, gpu)
    }

    #[test]
    fn count_follows_stride() {
        let buffer = test_buffer(256, 16);
        assert_eq!(buffer.count(), 16);
        buffer.record_resize(512);
        assert_eq!(buffer.size(), 512);
        assert_eq!(buffer.count(), 32);
    }

    #[test]
    fn view_outside_buffer_is_rejected() {
        let buffer = Arc::new(test_buffer(64, 1));
        assert!(BufferView::new(Arc::clone(&buffer), 32, 32).is_ok());
        assert!(BufferView::new(Arc::clone(&buffer), 32, 33).is_err());
        assert!(BufferView::new(buffer, 0, 0).is_err());
    }
}
