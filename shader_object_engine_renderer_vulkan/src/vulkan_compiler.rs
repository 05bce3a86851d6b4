/// NagaGlslCompiler - GLSL to SPIR-V ShaderCompiler backed by naga
///
/// Precompiled SPIR-V is checked with spirq reflection: the module must
/// parse and expose the requested entry point for the requested stage.

use shader_object_engine::shobj::shader::{ShaderCompiler, ShaderStage};
use spirq::spirv::ExecutionModel;

const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Magic, version, generator, bound, schema
const SPIRV_HEADER_BYTES: usize = 20;

/// GLSL compiler producing SPIR-V for shader objects
///
/// The naga GLSL front end handles vertex, fragment and compute shaders only.
/// Tessellation and geometry units must be supplied as precompiled SPIR-V.
#[derive(Default)]
pub struct NagaGlslCompiler {
    frontend: naga::front::glsl::Frontend,
}

impl NagaGlslCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

fn naga_stage(stage: ShaderStage) -> Option<naga::ShaderStage> {
    match stage {
        ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Some(naga::ShaderStage::Fragment),
        ShaderStage::Compute => Some(naga::ShaderStage::Compute),
        ShaderStage::TessellationControl
        | ShaderStage::TessellationEvaluation
        | ShaderStage::Geometry => None,
    }
}

fn execution_model(stage: ShaderStage) -> ExecutionModel {
    match stage {
        ShaderStage::Vertex => ExecutionModel::Vertex,
        ShaderStage::TessellationControl => ExecutionModel::TessellationControl,
        ShaderStage::TessellationEvaluation => ExecutionModel::TessellationEvaluation,
        ShaderStage::Geometry => ExecutionModel::Geometry,
        ShaderStage::Fragment => ExecutionModel::Fragment,
        ShaderStage::Compute => ExecutionModel::GLCompute,
    }
}

/// Every instruction's word count (upper 16 bits) must be non-zero and fit the module
fn check_instruction_lengths(words: &[u32]) -> Result<(), String> {
    let mut at = SPIRV_HEADER_BYTES / 4;
    while at < words.len() {
        let count = (words[at] >> 16) as usize;
        if count == 0 || at + count > words.len() {
            return Err(format!("Truncated SPIR-V instruction at word {}", at));
        }
        at += count;
    }
    Ok(())
}

impl ShaderCompiler for NagaGlslCompiler {
    fn compile(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> Result<Vec<u8>, String> {
        let shader_stage = naga_stage(stage)
            .ok_or_else(|| format!("GLSL front end cannot compile {:?} shaders", stage))?;
        if entry_point != "main" {
            return Err(format!("GLSL entry point must be 'main' (got '{}')", entry_point));
        }

        let module = self
            .frontend
            .parse(&naga::front::glsl::Options::from(shader_stage), source)
            .map_err(|e| e.emit_to_string(source))?;

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

        let pipeline_options = naga::back::spv::PipelineOptions {
            shader_stage,
            entry_point: entry_point.to_string(),
        };
        let words = naga::back::spv::write_vec(
            &module,
            &info,
            &naga::back::spv::Options::default(),
            Some(&pipeline_options),
        )
        .map_err(|e| format!("SPIR-V generation failed: {}", e))?;

        Ok(bytemuck::cast_slice::<u32, u8>(&words).to_vec())
    }

    fn validate(&mut self, stage: ShaderStage, code: &[u8], entry_point: &str) -> Result<(), String> {
        if code.len() < SPIRV_HEADER_BYTES || code.len() % 4 != 0 {
            return Err(format!(
                "SPIR-V size must be a multiple of 4 holding at least the {}-byte header (got {} bytes)",
                SPIRV_HEADER_BYTES, code.len()
            ));
        }

        // Header words are read little endian; spirq indexes the header unchecked
        let words: Vec<u32> = code
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if words[0] != SPIRV_MAGIC {
            return Err(format!("Bad SPIR-V magic number {:#010x}", words[0]));
        }
        check_instruction_lengths(&words)?;

        let entry_points = spirq::ReflectConfig::new()
            .spv(words)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| format!("SPIR-V reflection failed: {:?}", e))?;

        let expected = execution_model(stage);
        match entry_points.iter().find(|ep| ep.name == entry_point) {
            Some(ep) if ep.exec_model == expected => Ok(()),
            Some(ep) => Err(format!(
                "Entry point '{}' is a {:?} shader, expected {:?}", entry_point, ep.exec_model, expected
            )),
            None => Err(format!("SPIR-V has no entry point named '{}'", entry_point)),
        }
    }
}

#[cfg(test)]
#[path = "vulkan_compiler_tests.rs"]
mod tests;
