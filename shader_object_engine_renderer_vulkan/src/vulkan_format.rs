/// Conversions from engine types to Vulkan enums and flags

use ash::vk;
use shader_object_engine::shobj::Error;
use shader_object_engine::shobj::shader::{ShaderStage, StageFlags, BindingType};
use shader_object_engine::shobj::draw::{
    CullMode, FrontFace, PolygonMode, PrimitiveTopology, CompareOp, ColorFormat, DepthFormat,
};

/// Convert a single ShaderStage to Vulkan shader stage flags
pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

/// Convert a stage set to Vulkan shader stage flags
pub(crate) fn stage_flags_to_vk(flags: StageFlags) -> vk::ShaderStageFlags {
    flags
        .stages()
        .fold(vk::ShaderStageFlags::empty(), |acc, stage| acc | shader_stage_to_vk(stage))
}

pub(crate) fn binding_type_to_vk(binding_type: BindingType) -> vk::DescriptorType {
    match binding_type {
        BindingType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        BindingType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        BindingType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        BindingType::Sampler => vk::DescriptorType::SAMPLER,
        BindingType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::PatchList => vk::PrimitiveTopology::PATCH_LIST,
    }
}

pub(crate) fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn color_format_to_vk(format: ColorFormat) -> vk::Format {
    match format {
        ColorFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        ColorFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        ColorFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        ColorFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        ColorFormat::A2B10G10R10_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        ColorFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        ColorFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub(crate) fn depth_format_to_vk(format: DepthFormat) -> vk::Format {
    match format {
        DepthFormat::D16_UNORM => vk::Format::D16_UNORM,
        DepthFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        DepthFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        DepthFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Whether a depth format also carries a stencil aspect
pub(crate) fn depth_format_has_stencil(format: DepthFormat) -> bool {
    matches!(format, DepthFormat::D24_UNORM_S8_UINT | DepthFormat::D32_SFLOAT_S8_UINT)
}

/// Map a failed Vulkan call to an engine error
///
/// Memory exhaustion maps to `Error::OutOfMemory`, everything else to a
/// backend error carrying `context`.
pub(crate) fn vk_result_to_error(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
        other => Error::BackendError(format!("{}: {:?}", context, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
