/// VulkanShaderDevice - Vulkan implementation of the ShaderDevice trait
///
/// Creates shader objects through `VK_EXT_shader_object` and the descriptor
/// set / pipeline layouts they are created against.

use shader_object_engine::shobj::{Result, Error};
use shader_object_engine::shobj::shader::{
    ShaderDevice, ShaderCreateDesc, ShaderCreateFailure, ShaderObjectHandle, DeviceLayoutId,
    ResourceLayoutDesc, StageFlags,
};
use shader_object_engine::{engine_bail, engine_debug, engine_error, engine_info};
use ash::vk;
use ash::vk::Handle;
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_command_stream::VulkanCommandStream;
use crate::vulkan_format::{binding_type_to_vk, shader_stage_to_vk, stage_flags_to_vk, vk_result_to_error};

/// Shader-related features of a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderObjectFeatures {
    /// `shaderObject` from VK_EXT_shader_object
    pub shader_object: bool,
    /// `tessellationShader`
    pub tessellation: bool,
    /// `geometryShader`
    pub geometry: bool,
}

impl ShaderObjectFeatures {
    /// Query the features of a physical device
    pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let mut shader_object_features = vk::PhysicalDeviceShaderObjectFeaturesEXT::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut shader_object_features);

        unsafe {
            instance.get_physical_device_features2(physical_device, &mut features2);
        }

        let base = features2.features;
        Self {
            shader_object: shader_object_features.shader_object == vk::TRUE,
            tessellation: base.tessellation_shader == vk::TRUE,
            geometry: base.geometry_shader == vk::TRUE,
        }
    }

    /// Stages usable with these features
    ///
    /// Vertex, fragment and compute are always available.
    pub fn enabled_stages(&self) -> StageFlags {
        let mut stages = StageFlags::VERTEX | StageFlags::FRAGMENT | StageFlags::COMPUTE;
        if self.tessellation {
            stages |= StageFlags::TESSELLATION_CONTROL | StageFlags::TESSELLATION_EVALUATION;
        }
        if self.geometry {
            stages |= StageFlags::GEOMETRY;
        }
        stages
    }
}

/// Device-side objects of one resource layout
struct LayoutObjects {
    pipeline_layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

/// Vulkan shader object device
///
/// The logical device must have been created with the `shaderObject`
/// feature and the `VK_EXT_shader_object` extension enabled.
pub struct VulkanShaderDevice {
    /// Vulkan logical device
    device: Arc<ash::Device>,
    /// VK_EXT_shader_object function table
    shader_object: ash::ext::shader_object::Device,
    /// Features the device was created with
    features: ShaderObjectFeatures,
    /// Layouts by raw pipeline layout handle
    layouts: FxHashMap<u64, LayoutObjects>,
}

impl VulkanShaderDevice {
    /// Create a new shader object device
    ///
    /// # Arguments
    ///
    /// * `instance` - Vulkan instance the device was created from
    /// * `physical_device` - Physical device backing `device`
    /// * `device` - Vulkan logical device
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let features = ShaderObjectFeatures::query(instance, physical_device);
        if !features.shader_object {
            engine_bail!("shobj::vulkan", "Physical device does not support VK_EXT_shader_object");
        }

        let shader_object = ash::ext::shader_object::Device::new(instance, &device);

        engine_info!("shobj::vulkan", "Shader object device ready (tessellation: {}, geometry: {})",
            features.tessellation, features.geometry);

        Ok(Self {
            device,
            shader_object,
            features,
            layouts: FxHashMap::default(),
        })
    }

    /// Features the device exposes
    pub fn features(&self) -> ShaderObjectFeatures {
        self.features
    }

    /// Get the underlying Vulkan device
    pub fn device(&self) -> &Arc<ash::Device> {
        &self.device
    }

    /// Wrap a command buffer into a command stream for this device
    pub fn create_command_stream(&self, command_buffer: vk::CommandBuffer) -> VulkanCommandStream {
        VulkanCommandStream::new(self.device.clone(), self.shader_object.clone(), command_buffer)
    }

    fn destroy_layout_objects(&self, objects: LayoutObjects) {
        unsafe {
            self.device.destroy_pipeline_layout(objects.pipeline_layout, None);
            for set_layout in objects.set_layouts {
                self.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

impl ShaderDevice for VulkanShaderDevice {
    fn enabled_stages(&self) -> StageFlags {
        self.features.enabled_stages()
    }

    fn create_layout(&mut self, desc: &ResourceLayoutDesc) -> Result<DeviceLayoutId> {
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let mut set_layouts = Vec::with_capacity(desc.set_layouts.len());
        for set_desc in &desc.set_layouts {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = set_desc
                .bindings
                .iter()
                .map(|binding| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.binding)
                        .descriptor_type(binding_type_to_vk(binding.binding_type))
                        .descriptor_count(binding.count)
                        .stage_flags(stage_flags_to_vk(binding.stages))
                })
                .collect();

            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

            match unsafe { self.device.create_descriptor_set_layout(&create_info, None) } {
                Ok(set_layout) => set_layouts.push(set_layout),
                Err(e) => {
                    engine_error!("shobj::vulkan", "Failed to create descriptor set layout: {:?}", e);
                    for created in set_layouts {
                        unsafe { self.device.destroy_descriptor_set_layout(created, None) };
                    }
                    return Err(vk_result_to_error(e, "Failed to create descriptor set layout"));
                }
            }
        }

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let pipeline_layout = match unsafe { self.device.create_pipeline_layout(&create_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                engine_error!("shobj::vulkan", "Failed to create pipeline layout: {:?}", e);
                for created in set_layouts {
                    unsafe { self.device.destroy_descriptor_set_layout(created, None) };
                }
                return Err(vk_result_to_error(e, "Failed to create pipeline layout"));
            }
        };

        let id = pipeline_layout.as_raw();
        self.layouts.insert(id, LayoutObjects {
            pipeline_layout,
            set_layouts,
            push_constant_ranges,
        });

        Ok(DeviceLayoutId(id))
    }

    fn destroy_layout(&mut self, layout: DeviceLayoutId) {
        if let Some(objects) = self.layouts.remove(&layout.0) {
            self.destroy_layout_objects(objects);
        }
    }

    fn create_shaders(
        &mut self,
        descs: &[ShaderCreateDesc<'_>],
    ) -> std::result::Result<Vec<ShaderObjectHandle>, ShaderCreateFailure> {
        let fail = |error: Error| ShaderCreateFailure {
            partial: vec![None; descs.len()],
            error,
        };

        let mut layouts = Vec::with_capacity(descs.len());
        let mut entry_points = Vec::with_capacity(descs.len());
        for desc in descs {
            let objects = self.layouts.get(&desc.layout.0).ok_or_else(|| {
                fail(Error::InvalidResource(format!(
                    "Unknown device layout {:#x} for '{}'", desc.layout.0, desc.name
                )))
            })?;
            if desc.code.len() % 4 != 0 {
                return Err(fail(Error::InvalidResource(format!(
                    "SPIR-V for '{}' is not 4-byte aligned (size: {} bytes)", desc.name, desc.code.len()
                ))));
            }
            let entry_point = CString::new(desc.entry_point).map_err(|_| {
                fail(Error::InvalidResource(format!(
                    "Entry point of '{}' contains a NUL byte", desc.name
                )))
            })?;
            layouts.push(objects);
            entry_points.push(entry_point);
        }

        let create_infos: Vec<vk::ShaderCreateInfoEXT> = descs
            .iter()
            .zip(layouts.iter().zip(entry_points.iter()))
            .map(|(desc, (objects, entry_point))| {
                let flags = if desc.link {
                    vk::ShaderCreateFlagsEXT::LINK_STAGE
                } else {
                    vk::ShaderCreateFlagsEXT::empty()
                };
                vk::ShaderCreateInfoEXT::default()
                    .flags(flags)
                    .stage(shader_stage_to_vk(desc.stage))
                    .next_stage(stage_flags_to_vk(desc.next_stages))
                    .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                    .code(desc.code)
                    .name(entry_point)
                    .set_layouts(&objects.set_layouts)
                    .push_constant_ranges(&objects.push_constant_ranges)
            })
            .collect();

        match unsafe { self.shader_object.create_shaders(&create_infos, None) } {
            Ok(shaders) => {
                let handles: Vec<Option<ShaderObjectHandle>> = shaders
                    .iter()
                    .map(|shader| ShaderObjectHandle::from_raw(shader.as_raw()))
                    .collect();

                if handles.iter().all(Option::is_some) {
                    engine_debug!("shobj::vulkan", "Created {} shader object(s)", handles.len());
                    Ok(handles.into_iter().flatten().collect())
                } else {
                    engine_error!("shobj::vulkan", "vkCreateShadersEXT succeeded with null shader objects");
                    Err(ShaderCreateFailure {
                        partial: handles,
                        error: Error::BackendError("Driver returned null shader objects".to_string()),
                    })
                }
            }
            Err((partial, e)) => {
                engine_error!("shobj::vulkan", "Failed to create shader objects: {:?}", e);
                let mut handles: Vec<Option<ShaderObjectHandle>> = partial
                    .iter()
                    .map(|shader| ShaderObjectHandle::from_raw(shader.as_raw()))
                    .collect();
                handles.resize(descs.len(), None);
                Err(ShaderCreateFailure {
                    partial: handles,
                    error: vk_result_to_error(e, "Failed to create shader objects"),
                })
            }
        }
    }

    fn destroy_shader(&mut self, handle: ShaderObjectHandle) {
        unsafe {
            self.shader_object.destroy_shader(vk::ShaderEXT::from_raw(handle.as_raw()), None);
        }
    }
}

impl Drop for VulkanShaderDevice {
    fn drop(&mut self) {
        let layouts: Vec<LayoutObjects> = self.layouts.drain().map(|(_, objects)| objects).collect();
        for objects in layouts {
            self.destroy_layout_objects(objects);
        }
    }
}
