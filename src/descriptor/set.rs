//! Descriptor sets.
//!
//! A set owns one entry per flattened `{binding, array-index}` slot of its
//! layout. Binds mutate the logical table and mark the set dirty; `update`
//! synchronizes the native table, maintains the per-resource observer
//! registrations, and clears the flag. No draw may consume a dirty set
//! without an intervening `update`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GpuDescriptorSet;
use crate::device::Device;
use crate::resources::{next_resource_id, Buffer, BufferView, DescriptorSetLayout, Sampler, Texture, TextureView};
use crate::sync::AccessFlags;
use crate::types::DescriptorType;

/// Contents of one descriptor slot.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSlot {
    pub buffer: Option<BufferView>,
    pub texture: Option<TextureView>,
    pub sampler: Option<Arc<Sampler>>,
}

impl DescriptorSlot {
    /// Identity of what is bound, including the buffer's reallocation
    /// generation so a resized buffer forces a native rewrite.
    fn fingerprint(&self) -> SlotFingerprint {
        SlotFingerprint {
            buffer: self
                .buffer
                .as_ref()
                .map(|v| (v.id(), v.buffer().generation())),
            texture: self.texture.as_ref().map(|v| v.id()),
            sampler: self.sampler.as_ref().map(|s| s.id()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SlotFingerprint {
    buffer: Option<(u64, u64)>,
    texture: Option<u64>,
    sampler: Option<u64>,
}

enum Engaged {
    Buffer(Arc<Buffer>),
    Texture(Arc<Texture>),
}

impl Engaged {
    fn id(&self) -> u64 {
        match self {
            Self::Buffer(buffer) => buffer.id(),
            Self::Texture(texture) => texture.id(),
        }
    }
}

pub struct DescriptorSet {
    id: u64,
    layout: Arc<DescriptorSetLayout>,
    /// Shared with observer registrations: resource mutation re-dirties the
    /// set through this same flag.
    dirty: Arc<AtomicBool>,
    slots: Mutex<Vec<DescriptorSlot>>,
    /// Fingerprint of the last synchronized table, for change detection.
    synced: Mutex<Vec<SlotFingerprint>>,
    engaged: Mutex<Vec<Engaged>>,
    gpu: GpuDescriptorSet,
}

impl std::fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl DescriptorSet {
    pub(crate) fn new(layout: Arc<DescriptorSetLayout>, gpu: GpuDescriptorSet) -> Self {
        let count = layout.descriptor_count() as usize;
        Self {
            id: next_resource_id(),
            layout,
            dirty: Arc::new(AtomicBool::new(false)),
            slots: Mutex::new(vec![DescriptorSlot::default(); count]),
            synced: Mutex::new(vec![SlotFingerprint::default(); count]),
            engaged: Mutex::new(Vec::new()),
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn slot(&self, flat_index: u32) -> Option<DescriptorSlot> {
        self.slots.lock().get(flat_index as usize).cloned()
    }

    /// Bind a buffer view to `{binding, 0}`.
    pub fn bind_buffer(&self, binding: u32, view: BufferView) {
        self.bind_buffer_at(binding, 0, view);
    }

    /// Bind a buffer view to `{binding, array_index}`. A type-mismatched
    /// bind is logged and skipped.
    pub fn bind_buffer_at(&self, binding: u32, array_index: u32, view: BufferView) {
        let Some(flat) = self.checked_slot(binding, array_index, DescriptorType::is_buffer, "buffer")
        else {
            return;
        };
        let mut slots = self.slots.lock();
        let slot = &mut slots[flat as usize];
        slot.buffer = Some(view);
        self.dirty.store(true, Ordering::Release);
    }

    /// Bind a texture view to `{binding, 0}`.
    pub fn bind_texture(&self, binding: u32, view: TextureView) {
        self.bind_texture_at(binding, 0, view);
    }

    pub fn bind_texture_at(&self, binding: u32, array_index: u32, view: TextureView) {
        let Some(flat) =
            self.checked_slot(binding, array_index, DescriptorType::is_texture, "texture")
        else {
            return;
        };
        let mut slots = self.slots.lock();
        slots[flat as usize].texture = Some(view);
        self.dirty.store(true, Ordering::Release);
    }

    /// Bind a sampler to `{binding, 0}`.
    pub fn bind_sampler(&self, binding: u32, sampler: Arc<Sampler>) {
        self.bind_sampler_at(binding, 0, sampler);
    }

    pub fn bind_sampler_at(&self, binding: u32, array_index: u32, sampler: Arc<Sampler>) {
        let Some(flat) =
            self.checked_slot(binding, array_index, DescriptorType::is_sampler, "sampler")
        else {
            return;
        };
        let mut slots = self.slots.lock();
        slots[flat as usize].sampler = Some(sampler);
        self.dirty.store(true, Ordering::Release);
    }

    fn checked_slot(
        &self,
        binding: u32,
        array_index: u32,
        accepts: impl Fn(DescriptorType) -> bool,
        what: &str,
    ) -> Option<u32> {
        let Some(flat) = self.layout.flat_index(binding, array_index) else {
            log::error!(
                "descriptor set {}: binding {{{binding}, {array_index}}} not in layout",
                self.id
            );
            return None;
        };
        let ty = self.layout.slot(flat)?.ty;
        if !accepts(ty) {
            log::error!(
                "descriptor set {}: bound {what} to {{{binding}, {array_index}}} of type {ty:?}",
                self.id
            );
            return None;
        }
        Some(flat)
    }

    /// Synchronize the native table. No-op when clean. Returns the number
    /// of slots whose native entry was rewritten.
    pub fn update(&self, device: &Device) -> usize {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return 0;
        }

        let slots = self.slots.lock().clone();
        let mut synced = self.synced.lock();
        let mut written = 0;
        for (index, (current, old)) in slots.iter().zip(synced.iter_mut()).enumerate() {
            let fingerprint = current.fingerprint();
            if fingerprint == *old {
                continue;
            }
            *old = fingerprint;
            let flat = index as u32;
            device.write_descriptor_slot(self, flat, current);
            if let Some(slot_desc) = self.layout.slot(flat) {
                let access = match slot_desc.ty {
                    DescriptorType::StorageBuffer
                    | DescriptorType::DynamicStorageBuffer
                    | DescriptorType::StorageTexture => {
                        AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE
                    }
                    ty if ty.is_buffer() => AccessFlags::UNIFORM_READ,
                    _ => AccessFlags::SHADER_READ,
                };
                if let Some(view) = &current.buffer {
                    device
                        .access_tracker()
                        .check_in(view.buffer().id(), slot_desc.stages, access);
                }
                if let Some(view) = &current.texture {
                    device
                        .access_tracker()
                        .check_in(view.texture().id(), slot_desc.stages, access);
                }
            }
            written += 1;
        }
        drop(synced);

        self.refresh_observers();
        written
    }

    /// Reconcile observer registrations with the current table: disengage
    /// resources no longer referenced, connect newly referenced ones.
    fn refresh_observers(&self) {
        let slots = self.slots.lock();
        let mut fresh: Vec<Engaged> = Vec::new();
        for slot in slots.iter() {
            if let Some(view) = &slot.buffer {
                if !fresh.iter().any(|e| e.id() == view.buffer().id()) {
                    fresh.push(Engaged::Buffer(Arc::clone(view.buffer())));
                }
            }
            if let Some(view) = &slot.texture {
                if !fresh.iter().any(|e| e.id() == view.texture().id()) {
                    fresh.push(Engaged::Texture(Arc::clone(view.texture())));
                }
            }
        }
        drop(slots);

        let mut engaged = self.engaged.lock();
        for old in engaged.iter() {
            if !fresh.iter().any(|e| e.id() == old.id()) {
                match old {
                    Engaged::Buffer(buffer) => buffer.observers().disengage(&self.dirty),
                    Engaged::Texture(texture) => texture.observers().disengage(&self.dirty),
                }
            }
        }
        for new in &fresh {
            match new {
                Engaged::Buffer(buffer) => buffer.observers().connect(&self.dirty),
                Engaged::Texture(texture) => texture.observers().connect(&self.dirty),
            }
        }
        *engaged = fresh;
    }

    pub(crate) fn gpu(&self) -> &GpuDescriptorSet {
        &self.gpu
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        let engaged = self.engaged.lock();
        for entry in engaged.iter() {
            match entry {
                Engaged::Buffer(buffer) => buffer.observers().disengage(&self.dirty),
                Engaged::Texture(texture) => texture.observers().disengage(&self.dirty),
            }
        }
    }
}
