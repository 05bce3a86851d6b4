/*!
# Shader Object Engine - Vulkan Backend

Vulkan implementation of the shader object engine traits on top of
`VK_EXT_shader_object`, using the Ash library for Vulkan bindings.

- **VulkanShaderDevice**: descriptor set / pipeline layouts and shader object
  creation (`vkCreateShadersEXT`, linked groups via `LINK_STAGE`)
- **VulkanCommandStream**: `vkCmdBindShadersEXT`, dynamic state and dynamic
  rendering targets selected by attachment formats
- **NagaGlslCompiler**: GLSL to SPIR-V through naga, SPIR-V entry point
  checks through spirq

# Example

```no_run
use std::sync::{Arc, Mutex};
use shader_object_engine::shobj::{Config, ShaderRegistry};
use shader_object_engine_renderer_vulkan::shobj::{VulkanShaderDevice, NagaGlslCompiler};

# fn run(instance: &ash::Instance, physical_device: ash::vk::PhysicalDevice, device: Arc<ash::Device>)
#     -> shader_object_engine::shobj::Result<()> {
let shader_device = Arc::new(Mutex::new(VulkanShaderDevice::new(instance, physical_device, device)?));
let _registry = ShaderRegistry::new(shader_device, Box::new(NagaGlslCompiler::new()), Config::default());
# Ok(())
# }
```
*/

mod vulkan_format;
mod vulkan_shader_device;
mod vulkan_command_stream;
mod vulkan_compiler;

// Main shobj namespace module
pub mod shobj {
    pub use crate::vulkan_shader_device::{VulkanShaderDevice, ShaderObjectFeatures};
    pub use crate::vulkan_command_stream::{VulkanCommandStream, RenderTarget};
    pub use crate::vulkan_compiler::NagaGlslCompiler;
}
