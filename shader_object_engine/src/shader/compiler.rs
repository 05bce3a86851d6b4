/// ShaderCompiler trait - the "compile text -> bytecode" collaborator

use crate::shader::ShaderStage;

/// Shader source handed to unit construction
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// Source text, compiled by the ShaderCompiler
    Text(String),
    /// Precompiled bytecode, checked by `ShaderCompiler::validate`
    Bytecode(Vec<u8>),
}

/// Shader compilation service
///
/// Failures are returned as the compiler's message; the caller attaches the
/// unit name.
pub trait ShaderCompiler: Send {
    /// Compile source text for `stage` into bytecode
    fn compile(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> std::result::Result<Vec<u8>, String>;

    /// Check precompiled bytecode before it is accepted
    ///
    /// The default accepts any non-empty blob.
    fn validate(
        &mut self,
        _stage: ShaderStage,
        code: &[u8],
        _entry_point: &str,
    ) -> std::result::Result<(), String> {
        if code.is_empty() {
            return Err("empty bytecode".to_string());
        }
        Ok(())
    }
}
