/// Resource layouts - descriptor bindings and push constant ranges a shader
/// expects, shared by every unit of one model/material category

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::shader::{ShaderDevice, DeviceLayoutId, StageFlags};

/// Type of a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Uniform buffer (UBO)
    UniformBuffer,
    /// Storage buffer (SSBO)
    StorageBuffer,
    /// Combined image + sampler
    CombinedImageSampler,
    /// Sampled image without sampler
    SampledImage,
    /// Standalone sampler
    Sampler,
    /// Storage image
    StorageImage,
}

/// One binding within a descriptor set layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding number within the set
    pub binding: u32,
    /// Descriptor type
    pub binding_type: BindingType,
    /// Array size (1 for non-arrays)
    pub count: u32,
    /// Stages that access this binding
    pub stages: StageFlags,
}

/// Bindings of one descriptor set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

/// Push constant range descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Shader stages that can access these push constants
    pub stages: StageFlags,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// Full resource-layout descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLayoutDesc {
    /// Descriptor set layouts, indexed by set number
    pub set_layouts: Vec<DescriptorSetLayoutDesc>,
    /// Push constant ranges
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Immutable, shared resource layout
///
/// Compatibility between units is reference identity: two units are
/// compatible only if they hold the same `Arc<ResourceLayout>`. Structurally
/// equal layouts registered under different categories are distinct.
#[derive(Debug)]
pub struct ResourceLayout {
    category: String,
    desc: ResourceLayoutDesc,
    device_layout: DeviceLayoutId,
}

impl ResourceLayout {
    /// Category this layout was registered under
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Layout descriptor
    pub fn desc(&self) -> &ResourceLayoutDesc {
        &self.desc
    }

    /// Device-side layout identifier
    pub fn device_layout(&self) -> DeviceLayoutId {
        self.device_layout
    }

    /// First push constant range large enough for `size` bytes at offset 0
    pub fn push_constant_range_for(&self, size: u32) -> Option<&PushConstantRange> {
        self.desc.push_constant_ranges.iter()
            .find(|r| r.offset == 0 && r.size >= size)
    }

    /// Whether two layout references are the same layout
    pub fn same(a: &Arc<ResourceLayout>, b: &Arc<ResourceLayout>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

/// Registry of resource layouts keyed by model/material category
pub struct LayoutRegistry {
    layouts: FxHashMap<String, Arc<ResourceLayout>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self { layouts: FxHashMap::default() }
    }

    /// Create the device layout for `category` and register it
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the category is already registered or a push
    /// constant range is empty; device errors are propagated.
    pub fn register(
        &mut self,
        device: &mut dyn ShaderDevice,
        category: &str,
        desc: ResourceLayoutDesc,
    ) -> Result<Arc<ResourceLayout>> {
        if self.layouts.contains_key(category) {
            crate::engine_bail!("shobj::LayoutRegistry",
                error = Error::InvalidResource(format!("Layout category '{}' already registered", category)));
        }
        if let Some(range) = desc.push_constant_ranges.iter().find(|r| r.size == 0 || r.stages.is_empty()) {
            crate::engine_bail!("shobj::LayoutRegistry",
                error = Error::InvalidResource(format!(
                    "Layout '{}' has an empty push constant range at offset {}", category, range.offset)));
        }

        let device_layout = device.create_layout(&desc)?;
        let layout = Arc::new(ResourceLayout {
            category: category.to_string(),
            desc,
            device_layout,
        });
        self.layouts.insert(category.to_string(), layout.clone());

        crate::engine_debug!("shobj::LayoutRegistry", "Registered layout '{}'", category);
        Ok(layout)
    }

    /// Look up a layout by category
    pub fn get(&self, category: &str) -> Option<Arc<ResourceLayout>> {
        self.layouts.get(category).cloned()
    }

    /// Number of registered layouts
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Destroy every device layout and forget all categories
    ///
    /// Units still holding an `Arc<ResourceLayout>` keep the descriptor, but
    /// its device layout is gone; call only after all shader objects are destroyed.
    pub fn destroy_all(&mut self, device: &mut dyn ShaderDevice) {
        for (_, layout) in self.layouts.drain() {
            device.destroy_layout(layout.device_layout);
        }
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
