/// VulkanCommandStream - Vulkan implementation of the CommandStream trait
///
/// Records shader object binds, dynamic state and draws into a command
/// buffer. There is no pipeline object: every fixed-function value is
/// dynamic state and attachment formats select a dynamic rendering target.

use shader_object_engine::shobj::{Result, Error};
use shader_object_engine::shobj::shader::{ShaderStage, StageFlags, ShaderObjectHandle, DeviceLayoutId};
use shader_object_engine::shobj::draw::{CommandStream, DrawModel, FixedFunctionValue, AttachmentFormats};
use shader_object_engine::{engine_bail, engine_err, engine_trace};
use ash::vk;
use ash::vk::Handle;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_format::{
    shader_stage_to_vk, stage_flags_to_vk, cull_mode_to_vk, front_face_to_vk, polygon_mode_to_vk,
    topology_to_vk, compare_op_to_vk, depth_format_has_stencil,
};

/// Attachments rendered to when a draw uses a given set of formats
///
/// Images must already be in `COLOR_ATTACHMENT_OPTIMAL` /
/// `DEPTH_STENCIL_ATTACHMENT_OPTIMAL` layout when the stream switches to them.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    /// Color attachment view
    pub color_view: vk::ImageView,
    /// Depth attachment view (must be present when the formats declare depth)
    pub depth_view: Option<vk::ImageView>,
    /// Render area
    pub extent: vk::Extent2D,
    /// Clear color applied the first time the target is entered in a frame
    pub clear_color: Option<[f32; 4]>,
}

/// Vulkan command stream
pub struct VulkanCommandStream {
    /// Vulkan device
    device: Arc<ash::Device>,
    /// VK_EXT_shader_object function table
    shader_object: ash::ext::shader_object::Device,
    /// Command buffer for recording
    command_buffer: vk::CommandBuffer,
    /// Targets by attachment formats
    targets: FxHashMap<AttachmentFormats, RenderTarget>,
    /// Formats of the target currently rendered to
    active_target: Option<AttachmentFormats>,
    /// Targets already entered this frame (later entries load instead of clear)
    entered: Vec<AttachmentFormats>,
    /// Whether the command buffer is currently recording
    is_recording: bool,
}

impl VulkanCommandStream {
    pub(crate) fn new(
        device: Arc<ash::Device>,
        shader_object: ash::ext::shader_object::Device,
        command_buffer: vk::CommandBuffer,
    ) -> Self {
        Self {
            device,
            shader_object,
            command_buffer,
            targets: FxHashMap::default(),
            active_target: None,
            entered: Vec::new(),
            is_recording: false,
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Register the target draws with `formats` render to
    ///
    /// Replaces any target previously registered for the same formats.
    pub fn register_target(&mut self, formats: AttachmentFormats, target: RenderTarget) -> Result<()> {
        if formats.depth.is_some() && target.depth_view.is_none() {
            engine_bail!("shobj::vulkan",
                "Render target for {:?} declares a depth format but has no depth view", formats);
        }
        self.targets.insert(formats, target);
        Ok(())
    }

    /// Begin recording a frame
    ///
    /// Resets the command buffer and sets every dynamic state shader objects
    /// require that the engine does not track itself. The wrapping
    /// `RecordingStream` must be reset right after, so go through
    /// `RecordingStream::restart(initial, |stream| stream.begin(extent))`.
    pub fn begin(&mut self, extent: vk::Extent2D) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command stream already recording".to_string()));
        }

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("shobj::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("shobj::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }

        self.is_recording = true;
        self.active_target = None;
        self.entered.clear();
        self.set_default_dynamic_state(extent);
        Ok(())
    }

    /// Finish recording a frame
    pub fn end(&mut self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command stream not recording".to_string()));
        }

        self.end_rendering();

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("shobj::vulkan", "Failed to end command buffer: {:?}", e))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn set_default_dynamic_state(&self, extent: vk::Extent2D) {
        let cmd = self.command_buffer;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.cmd_set_viewport_with_count(cmd, &[viewport]);
            self.device.cmd_set_scissor_with_count(cmd, &[scissor]);
            self.device.cmd_set_depth_bounds_test_enable(cmd, false);
            self.device.cmd_set_stencil_test_enable(cmd, false);
            self.device.cmd_set_primitive_restart_enable(cmd, false);
            self.device.cmd_set_rasterizer_discard_enable(cmd, false);
            self.device.cmd_set_depth_bias_enable(cmd, false);
            self.device.cmd_set_line_width(cmd, 1.0);

            // Vertices are pulled in the shaders
            self.shader_object.cmd_set_vertex_input(cmd, &[], &[]);
            self.shader_object.cmd_set_rasterization_samples(cmd, vk::SampleCountFlags::TYPE_1);
            self.shader_object.cmd_set_sample_mask(cmd, vk::SampleCountFlags::TYPE_1, &[u32::MAX]);
            self.shader_object.cmd_set_alpha_to_coverage_enable(cmd, false);
            self.shader_object.cmd_set_depth_clamp_enable(cmd, false);
            self.shader_object.cmd_set_color_blend_enable(cmd, 0, &[vk::FALSE]);
            self.shader_object.cmd_set_color_write_mask(cmd, 0, &[vk::ColorComponentFlags::RGBA]);
        }
    }

    fn end_rendering(&mut self) {
        if self.active_target.take().is_some() {
            unsafe {
                self.device.cmd_end_rendering(self.command_buffer);
            }
        }
    }

    fn switch_target(&mut self, formats: AttachmentFormats) -> Result<()> {
        if self.active_target == Some(formats) {
            return Ok(());
        }

        let target = match self.targets.get(&formats) {
            Some(target) => *target,
            None => engine_bail!("shobj::vulkan", "No render target registered for {:?}", formats),
        };

        self.end_rendering();

        let first_entry = !self.entered.contains(&formats);
        let color_load_op = match target.clear_color {
            Some(_) if first_entry => vk::AttachmentLoadOp::CLEAR,
            _ => vk::AttachmentLoadOp::LOAD,
        };
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(target.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(color_load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: target.clear_color.unwrap_or([0.0; 4]) },
            });

        let depth_attachment = target.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(if first_entry { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD })
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                })
        });

        let color_attachments = [color_attachment];
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        if let (Some(depth), Some(depth_format)) = (depth_attachment.as_ref(), formats.depth) {
            rendering_info = rendering_info.depth_attachment(depth);
            if depth_format_has_stencil(depth_format) {
                rendering_info = rendering_info.stencil_attachment(depth);
            }
        }

        unsafe {
            self.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }

        if first_entry {
            self.entered.push(formats);
        }
        self.active_target = Some(formats);
        engine_trace!("shobj::vulkan", "Rendering to target {:?}", formats);
        Ok(())
    }
}

impl CommandStream for VulkanCommandStream {
    fn set_fixed_function(&mut self, value: FixedFunctionValue) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command stream not recording".to_string()));
        }

        let cmd = self.command_buffer;
        match value {
            FixedFunctionValue::AttachmentFormats(formats) => return self.switch_target(formats),
            FixedFunctionValue::CullMode(mode) => unsafe {
                self.device.cmd_set_cull_mode(cmd, cull_mode_to_vk(mode));
            },
            FixedFunctionValue::FrontFace(face) => unsafe {
                self.device.cmd_set_front_face(cmd, front_face_to_vk(face));
            },
            FixedFunctionValue::PolygonMode(mode) => unsafe {
                self.shader_object.cmd_set_polygon_mode(cmd, polygon_mode_to_vk(mode));
            },
            FixedFunctionValue::Topology(topology) => unsafe {
                self.device.cmd_set_primitive_topology(cmd, topology_to_vk(topology));
            },
            FixedFunctionValue::PatchControlPoints(count) => unsafe {
                self.shader_object.cmd_set_patch_control_points(cmd, count);
            },
            FixedFunctionValue::DepthTestEnable(enable) => unsafe {
                self.device.cmd_set_depth_test_enable(cmd, enable);
            },
            FixedFunctionValue::DepthWriteEnable(enable) => unsafe {
                self.device.cmd_set_depth_write_enable(cmd, enable);
            },
            FixedFunctionValue::DepthCompareOp(op) => unsafe {
                self.device.cmd_set_depth_compare_op(cmd, compare_op_to_vk(op));
            },
        }
        Ok(())
    }

    fn bind_stages(&mut self, stages: &[ShaderStage], shaders: &[Option<ShaderObjectHandle>]) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command stream not recording".to_string()));
        }
        if stages.len() != shaders.len() {
            engine_bail!("shobj::vulkan",
                "bind_stages: {} stages but {} shaders", stages.len(), shaders.len());
        }

        let vk_stages: Vec<vk::ShaderStageFlags> = stages.iter().map(|s| shader_stage_to_vk(*s)).collect();
        let vk_shaders: Vec<vk::ShaderEXT> = shaders
            .iter()
            .map(|shader| match shader {
                Some(handle) => vk::ShaderEXT::from_raw(handle.as_raw()),
                None => vk::ShaderEXT::null(),
            })
            .collect();

        unsafe {
            self.shader_object.cmd_bind_shaders(self.command_buffer, &vk_stages, &vk_shaders);
        }
        Ok(())
    }

    fn push_constants(&mut self, layout: DeviceLayoutId, stages: StageFlags, offset: u32, data: &[u8]) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command stream not recording".to_string()));
        }

        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                vk::PipelineLayout::from_raw(layout.0),
                stage_flags_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn draw(&mut self, model: &DrawModel) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command stream not recording".to_string()));
        }
        if self.active_target.is_none() {
            engine_bail!("shobj::vulkan", "Draw of '{}' outside of a render target", model.name);
        }

        unsafe {
            self.device.cmd_draw(
                self.command_buffer,
                model.vertex_count,
                model.instance_count,
                model.first_vertex,
                0, // first_instance
            );
        }
        Ok(())
    }
}
