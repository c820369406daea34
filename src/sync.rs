//! CPU-visible synchronization primitives shared by all backends.
//!
//! Fences and semaphores are plain handles at this level. Backends that have
//! real native objects (Vulkan) keep a side table from handle to native
//! object; backends that execute synchronously (GL-style, recording) signal
//! the fence directly on submit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::types::ShaderStageFlags;

/// A fence signaled when a submission retires.
///
/// Waiting and polling go through [`crate::Device::wait_fence`] and
/// [`crate::Device::poll_fence`], which mirror the native fence state into
/// this flag. Cloning shares the signal state.
#[derive(Debug, Clone)]
pub struct Fence {
    id: u64,
    signaled: Arc<AtomicBool>,
}

impl Fence {
    fn new(id: u64) -> Self {
        Self {
            id,
            signaled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }
}

/// Opaque GPU-side semaphore handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemaphoreId(pub u64);

/// Recycling pool of semaphore handles.
///
/// Queues allocate the next link of their signal chain from here on every
/// submit and return the whole chain once the frame's fence lands.
#[derive(Debug, Default)]
pub struct SemaphorePool {
    next: AtomicU64,
    free: Mutex<Vec<SemaphoreId>>,
}

impl SemaphorePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self) -> SemaphoreId {
        if let Some(id) = self.free.lock().pop() {
            return id;
        }
        SemaphoreId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn recycle(&self, ids: impl IntoIterator<Item = SemaphoreId>) {
        self.free.lock().extend(ids);
    }

    /// Handles ever created, recycled or not.
    pub fn created(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Recycling pool of fences for submits where the caller passes none.
#[derive(Debug, Default)]
pub struct FencePool {
    next: AtomicU64,
    free: Mutex<Vec<Fence>>,
}

impl FencePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self) -> Fence {
        if let Some(fence) = self.free.lock().pop() {
            fence.reset();
            return fence;
        }
        Fence::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn recycle(&self, fence: Fence) {
        self.free.lock().push(fence);
    }
}

bitflags! {
    /// How a pipeline stage touches a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u8 {
        const UNIFORM_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
        const SHADER_WRITE = 1 << 2;
        const TRANSFER_READ = 1 << 3;
        const TRANSFER_WRITE = 1 << 4;
        const ATTACHMENT_WRITE = 1 << 5;
    }
}

impl AccessFlags {
    pub fn is_write(self) -> bool {
        self.intersects(Self::SHADER_WRITE | Self::TRANSFER_WRITE | Self::ATTACHMENT_WRITE)
    }
}

/// Accumulated access summary for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    pub stages: ShaderStageFlags,
    pub access: AccessFlags,
}

/// Tracks which stages touch which resources between barriers.
///
/// Descriptor updates check resources in as they are written; backends that
/// need explicit barriers (Vulkan) drain the tracker when building them,
/// synchronous backends ignore it.
#[derive(Debug, Default)]
pub struct AccessTracker {
    entries: Mutex<HashMap<u64, ResourceAccess>>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an access into the summary for `resource_id`.
    pub fn check_in(&self, resource_id: u64, stages: ShaderStageFlags, access: AccessFlags) {
        let mut entries = self.entries.lock();
        entries
            .entry(resource_id)
            .and_modify(|e| {
                e.stages |= stages;
                e.access |= access;
            })
            .or_insert(ResourceAccess { stages, access });
    }

    pub fn get(&self, resource_id: u64) -> Option<ResourceAccess> {
        self.entries.lock().get(&resource_id).copied()
    }

    /// Take and clear all accumulated accesses.
    pub fn drain(&self) -> Vec<(u64, ResourceAccess)> {
        self.entries.lock().drain().collect()
    }

    /// Drop tracking for a destroyed resource.
    pub fn forget(&self, resource_id: u64) {
        self.entries.lock().remove(&resource_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_signal_and_reset() {
        let pool = FencePool::new();
        let fence = pool.alloc();
        assert!(!fence.is_signaled());
        fence.signal();
        assert!(fence.is_signaled());
        pool.recycle(fence);
        let fence = pool.alloc();
        assert!(!fence.is_signaled(), "recycled fence must come back unsignaled");
    }

    #[test]
    fn semaphore_pool_recycles() {
        let pool = SemaphorePool::new();
        let a = pool.alloc();
        let b = pool.alloc();
        assert_ne!(a, b);
        pool.recycle([a, b]);
        let c = pool.alloc();
        assert!(c == a || c == b);
        assert_eq!(pool.created(), 2);
    }

    #[test]
    fn access_tracker_merges() {
        let tracker = AccessTracker::new();
        tracker.check_in(7, ShaderStageFlags::VERTEX, AccessFlags::UNIFORM_READ);
        tracker.check_in(7, ShaderStageFlags::FRAGMENT, AccessFlags::SHADER_READ);
        let access = tracker.get(7).unwrap();
        assert_eq!(
            access.stages,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
        );
        assert!(!access.access.is_write());
        assert_eq!(tracker.drain().len(), 1);
        assert!(tracker.get(7).is_none());
    }
}
