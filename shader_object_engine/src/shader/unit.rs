/// ShaderUnit - one compiled shader program and its binding contract
///
/// A unit is immutable after construction except for its shader object
/// handle, which the ShaderBuilder assigns exactly once.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::shader::{
    ShaderStage, StageFlags, ShaderSource, ShaderCompiler, ShaderObjectHandle,
    ResourceLayout, LayoutRegistry,
};

/// Descriptor for creating a shader unit
#[derive(Debug, Clone)]
pub struct ShaderUnitDesc {
    /// Unique name (diagnostics and lookup tag)
    pub name: String,
    /// Shader stage
    pub stage: ShaderStage,
    /// Stages allowed to follow this unit
    pub next_stages: StageFlags,
    /// Source text or precompiled bytecode
    pub source: ShaderSource,
    /// Entry point function name
    pub entry_point: String,
    /// Resource layout category (looked up in the LayoutRegistry)
    pub layout_category: String,
}

/// Compiled shader unit
#[derive(Debug)]
pub struct ShaderUnit {
    name: String,
    stage: ShaderStage,
    next_stages: StageFlags,
    code: Vec<u8>,
    entry_point: String,
    layout: Arc<ResourceLayout>,
    handle: Option<ShaderObjectHandle>,
    /// Names of the units created in the same linked call (empty when unlinked)
    link_partners: Vec<String>,
}

impl ShaderUnit {
    /// Compile and construct a unit
    ///
    /// # Errors
    ///
    /// - `InvalidResource` if the layout category is unknown or the next-stage
    ///   set contains stages that cannot follow `desc.stage`
    /// - `CompilationFailure` if the source does not compile (or bytecode is rejected)
    pub fn new(
        desc: ShaderUnitDesc,
        compiler: &mut dyn ShaderCompiler,
        layouts: &LayoutRegistry,
    ) -> Result<Self> {
        let layout = match layouts.get(&desc.layout_category) {
            Some(layout) => layout,
            None => {
                crate::engine_bail!("shobj::ShaderUnit",
                    error = Error::InvalidResource(format!(
                        "Unit '{}' references unknown layout category '{}'",
                        desc.name, desc.layout_category)));
            }
        };

        let illegal = desc.next_stages - desc.stage.legal_next_stages();
        if !illegal.is_empty() {
            crate::engine_bail!("shobj::ShaderUnit",
                error = Error::InvalidResource(format!(
                    "Unit '{}' ({:?}) declares illegal next stages {:?}",
                    desc.name, desc.stage, illegal)));
        }

        let code = match desc.source {
            ShaderSource::Text(ref text) => compiler.compile(desc.stage, text, &desc.entry_point),
            ShaderSource::Bytecode(ref code) => compiler
                .validate(desc.stage, code, &desc.entry_point)
                .map(|_| code.clone()),
        };
        let code = match code {
            Ok(code) => code,
            Err(message) => {
                crate::engine_bail!("shobj::ShaderUnit",
                    error = Error::CompilationFailure { unit: desc.name, message });
            }
        };

        crate::engine_debug!("shobj::ShaderUnit", "Compiled '{}' ({:?}, {} bytes)",
            desc.name, desc.stage, code.len());

        Ok(Self {
            name: desc.name,
            stage: desc.stage,
            next_stages: desc.next_stages,
            code,
            entry_point: desc.entry_point,
            layout,
            handle: None,
            link_partners: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn next_stages(&self) -> StageFlags {
        self.next_stages
    }

    /// Compiled bytecode
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Shared resource layout
    pub fn layout(&self) -> &Arc<ResourceLayout> {
        &self.layout
    }

    /// Shader object handle, if built
    pub fn handle(&self) -> Option<ShaderObjectHandle> {
        self.handle
    }

    /// Whether the unit holds a live shader object
    pub fn is_built(&self) -> bool {
        self.handle.is_some()
    }

    /// Names of the units this one was linked with (empty when unlinked)
    pub fn link_partners(&self) -> &[String] {
        &self.link_partners
    }

    pub fn is_linked(&self) -> bool {
        !self.link_partners.is_empty()
    }

    /// Handle for binding
    ///
    /// # Errors
    ///
    /// `BindingContractViolation` if the unit was never built (or its build failed).
    pub fn require_handle(&self) -> Result<ShaderObjectHandle> {
        match self.handle {
            Some(handle) => Ok(handle),
            None => {
                crate::engine_bail!("shobj::ShaderUnit",
                    error = Error::BindingContractViolation(format!(
                        "Unit '{}' has no shader object and cannot be bound", self.name)));
            }
        }
    }

    /// Assign the shader object handle (exactly once)
    pub(crate) fn set_handle(&mut self, handle: ShaderObjectHandle) -> Result<()> {
        if self.handle.is_some() {
            crate::engine_bail!("shobj::ShaderUnit",
                error = Error::BindingContractViolation(format!(
                    "Unit '{}' already holds a shader object", self.name)));
        }
        self.handle = Some(handle);
        Ok(())
    }

    pub(crate) fn set_link_partners(&mut self, partners: Vec<String>) {
        self.link_partners = partners;
    }

    /// Release the handle for destruction
    pub(crate) fn take_handle(&mut self) -> Option<ShaderObjectHandle> {
        self.handle.take()
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
