//! Descriptor set layouts, pipeline layouts and pipeline states.

use std::sync::Arc;

use crate::backend::GpuPipeline;
use crate::error::{GfxError, GfxResult};
use crate::types::{
    BlendState, DepthStencilState, DescriptorSetLayoutBinding, DescriptorType,
    DynamicOffsetPolicy, PrimitiveTopology, RasterizerState, ShaderStageFlags,
};

use super::next_resource_id;
use super::render_pass::RenderPass;
use super::shader::Shader;

/// One flattened `{binding, array-index}` descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatSlot {
    pub binding: u32,
    pub array_index: u32,
    pub ty: DescriptorType,
    pub stages: ShaderStageFlags,
}

/// An ordered, immutable sequence of descriptor bindings.
#[derive(Debug)]
pub struct DescriptorSetLayout {
    id: u64,
    bindings: Vec<DescriptorSetLayoutBinding>,
    flat: Vec<FlatSlot>,
    dynamic_count: u32,
}

impl DescriptorSetLayout {
    pub fn new(mut bindings: Vec<DescriptorSetLayoutBinding>) -> GfxResult<Self> {
        bindings.sort_by_key(|b| b.binding);
        if bindings.windows(2).any(|w| w[0].binding == w[1].binding) {
            return Err(GfxError::InvalidParameter(
                "descriptor set layout: duplicate binding index".to_owned(),
            ));
        }

        let mut flat = Vec::new();
        let mut dynamic_count = 0;
        for binding in &bindings {
            if binding.ty.is_dynamic() {
                dynamic_count += binding.count.max(1);
            }
            for array_index in 0..binding.count.max(1) {
                flat.push(FlatSlot {
                    binding: binding.binding,
                    array_index,
                    ty: binding.ty,
                    stages: binding.stages,
                });
            }
        }

        Ok(Self {
            id: next_resource_id(),
            bindings,
            flat,
            dynamic_count,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Total flattened descriptor count.
    pub fn descriptor_count(&self) -> u32 {
        self.flat.len() as u32
    }

    /// Count of dynamic-buffer descriptors.
    pub fn dynamic_count(&self) -> u32 {
        self.dynamic_count
    }

    pub fn slot(&self, flat_index: u32) -> Option<&FlatSlot> {
        self.flat.get(flat_index as usize)
    }

    pub fn slots(&self) -> &[FlatSlot] {
        &self.flat
    }

    /// Flat index of `{binding, array_index}`.
    pub fn flat_index(&self, binding: u32, array_index: u32) -> Option<u32> {
        self.flat
            .iter()
            .position(|s| s.binding == binding && s.array_index == array_index)
            .map(|i| i as u32)
    }

    fn max_binding(&self) -> u32 {
        self.bindings.last().map_or(0, |b| b.binding)
    }
}

/// An ordered sequence of set layouts plus the precomputed dynamic-offset
/// index tables backends consume at bind time.
#[derive(Debug)]
pub struct PipelineLayout {
    id: u64,
    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    policy: DynamicOffsetPolicy,
    /// Per set: `table[binding]` is the layout-order index into that set's
    /// dynamic-offset array, or -1 when the binding is not dynamic.
    dynamic_offset_indices: Vec<Vec<i32>>,
}

impl PipelineLayout {
    pub fn new(set_layouts: Vec<Arc<DescriptorSetLayout>>, policy: DynamicOffsetPolicy) -> Self {
        let dynamic_offset_indices = set_layouts
            .iter()
            .map(|layout| {
                let mut table = vec![-1i32; layout.max_binding() as usize + 1];
                let mut next = 0;
                for binding in layout.bindings() {
                    if binding.ty.is_dynamic() {
                        table[binding.binding as usize] = next;
                        next += binding.count.max(1) as i32;
                    }
                }
                table
            })
            .collect();
        Self {
            id: next_resource_id(),
            set_layouts,
            policy,
            dynamic_offset_indices,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    pub fn policy(&self) -> DynamicOffsetPolicy {
        self.policy
    }

    /// Layout-order dynamic-offset index of `{set, binding}`.
    pub fn dynamic_offset_index(&self, set: u32, binding: u32) -> Option<u32> {
        let index = *self
            .dynamic_offset_indices
            .get(set as usize)?
            .get(binding as usize)?;
        (index >= 0).then_some(index as u32)
    }

    /// Dynamic offsets expected when binding `set`.
    pub fn dynamic_offset_count(&self, set: u32) -> u32 {
        self.set_layouts
            .get(set as usize)
            .map_or(0, |l| l.dynamic_count())
    }
}

/// Everything needed to create a pipeline state.
#[derive(Debug, Clone)]
pub struct PipelineStateInfo {
    pub label: Option<String>,
    pub shader: Arc<Shader>,
    pub layout: Arc<PipelineLayout>,
    pub render_pass: Arc<RenderPass>,
    pub topology: PrimitiveTopology,
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub blend: BlendState,
}

impl PipelineStateInfo {
    pub fn new(
        shader: Arc<Shader>,
        layout: Arc<PipelineLayout>,
        render_pass: Arc<RenderPass>,
    ) -> Self {
        Self {
            label: None,
            shader,
            layout,
            render_pass,
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            blend: BlendState::opaque(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }
}

/// An immutable pipeline state bundle.
///
/// The crate-unique `id` backs the state cache's identity fast path: because
/// the bundle never mutates, an id match proves the whole derived native
/// configuration already applies.
#[derive(Debug)]
pub struct PipelineState {
    id: u64,
    info: PipelineStateInfo,
    /// Per set: `table[binding]` resolved through the layout's
    /// [`DynamicOffsetPolicy`], or -1 when not dynamic.
    dynamic_offset_map: Vec<Vec<i32>>,
    gpu: GpuPipeline,
}

impl PipelineState {
    pub(crate) fn new(info: PipelineStateInfo, gpu: GpuPipeline) -> Self {
        let dynamic_offset_map = Self::resolve_dynamic_offsets(&info);
        Self {
            id: next_resource_id(),
            info,
            dynamic_offset_map,
            gpu,
        }
    }

    /// Resolve each set's binding-to-offset-index table per the layout's
    /// policy. Layout order uses the precomputed tables verbatim; first
    /// match wins re-assigns indices in the order the shader's reflection
    /// walks the bindings, with unreferenced dynamic bindings appended in
    /// layout order so the offset array length never changes.
    fn resolve_dynamic_offsets(info: &PipelineStateInfo) -> Vec<Vec<i32>> {
        let layout = &info.layout;
        match layout.policy() {
            DynamicOffsetPolicy::LayoutOrder => layout
                .set_layouts()
                .iter()
                .enumerate()
                .map(|(set, set_layout)| {
                    let mut table = vec![-1i32; set_layout.max_binding() as usize + 1];
                    for binding in set_layout.bindings() {
                        if let Some(index) =
                            layout.dynamic_offset_index(set as u32, binding.binding)
                        {
                            table[binding.binding as usize] = index as i32;
                        }
                    }
                    table
                })
                .collect(),
            DynamicOffsetPolicy::FirstMatchWins => {
                let mut tables: Vec<Vec<i32>> = layout
                    .set_layouts()
                    .iter()
                    .map(|l| vec![-1i32; l.max_binding() as usize + 1])
                    .collect();
                let mut next: Vec<i32> = vec![0; tables.len()];

                let mut claim = |set: u32, binding: u32| {
                    let Some(set_layout) = layout.set_layouts().get(set as usize) else {
                        return;
                    };
                    let dynamic = set_layout
                        .bindings()
                        .iter()
                        .any(|b| b.binding == binding && b.ty.is_dynamic());
                    if !dynamic {
                        return;
                    }
                    let table = &mut tables[set as usize];
                    if table[binding as usize] < 0 {
                        table[binding as usize] = next[set as usize];
                        next[set as usize] += 1;
                    }
                };

                for block in info.shader.blocks() {
                    claim(block.set, block.binding);
                }
                // Dynamic bindings no stage references still occupy offsets.
                for (set, set_layout) in layout.set_layouts().iter().enumerate() {
                    for binding in set_layout.bindings() {
                        if binding.ty.is_dynamic() {
                            claim(set as u32, binding.binding);
                        }
                    }
                }
                tables
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &PipelineStateInfo {
        &self.info
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.info.shader
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.info.layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.info.topology
    }

    /// Resolved dynamic-offset index of `{set, binding}`.
    pub fn dynamic_offset_index(&self, set: u32, binding: u32) -> Option<u32> {
        let index = *self
            .dynamic_offset_map
            .get(set as usize)?
            .get(binding as usize)?;
        (index >= 0).then_some(index as u32)
    }

    pub(crate) fn gpu(&self) -> &GpuPipeline {
        &self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DescriptorType;

    fn binding(index: u32, ty: DescriptorType) -> DescriptorSetLayoutBinding {
        DescriptorSetLayoutBinding::new(index, ty, ShaderStageFlags::default())
    }

    #[test]
    fn layout_flattens_arrays() {
        let layout = DescriptorSetLayout::new(vec![
            binding(0, DescriptorType::DynamicUniformBuffer),
            binding(1, DescriptorType::CombinedSampledTexture).with_count(3),
        ])
        .unwrap();
        assert_eq!(layout.descriptor_count(), 4);
        assert_eq!(layout.dynamic_count(), 1);
        assert_eq!(layout.flat_index(1, 2), Some(3));
        assert_eq!(layout.flat_index(1, 3), None);
    }

    #[test]
    fn duplicate_bindings_rejected() {
        let result = DescriptorSetLayout::new(vec![
            binding(2, DescriptorType::UniformBuffer),
            binding(2, DescriptorType::Sampler),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_layout_indexes_dynamics_in_binding_order() {
        let set = Arc::new(
            DescriptorSetLayout::new(vec![
                binding(0, DescriptorType::UniformBuffer),
                binding(1, DescriptorType::DynamicUniformBuffer),
                binding(4, DescriptorType::DynamicStorageBuffer),
            ])
            .unwrap(),
        );
        let layout = PipelineLayout::new(vec![set], DynamicOffsetPolicy::LayoutOrder);
        assert_eq!(layout.dynamic_offset_index(0, 0), None);
        assert_eq!(layout.dynamic_offset_index(0, 1), Some(0));
        assert_eq!(layout.dynamic_offset_index(0, 4), Some(1));
        assert_eq!(layout.dynamic_offset_count(0), 2);
    }
}
