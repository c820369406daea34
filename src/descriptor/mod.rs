//! Descriptor sets and the per-resource observer registry.

pub mod hub;
mod set;

pub use set::{DescriptorSet, DescriptorSlot};
