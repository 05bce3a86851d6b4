/// Mock backend for unit tests (no GPU required)
///
/// Records every device, compiler and stream call so tests can assert on
/// exactly what the engine emitted.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::shader::{
    ShaderDevice, ShaderCompiler, ShaderCreateDesc, ShaderCreateFailure, ShaderObjectHandle,
    ShaderStage, StageFlags, DeviceLayoutId, ResourceLayoutDesc, ShaderUnit, ShaderUnitDesc,
    ShaderSource, LayoutRegistry, PushConstantRange,
};
use crate::draw::{CommandStream, DrawModel, FixedFunctionValue};

// ============================================================================
// Mock Shader Device
// ============================================================================

/// One created shader object
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedShader {
    pub handle: ShaderObjectHandle,
    pub name: String,
    pub stage: ShaderStage,
    pub link: bool,
}

#[derive(Debug)]
pub struct MockShaderDevice {
    pub enabled: StageFlags,
    pub next_handle: u64,
    pub created: Vec<CreatedShader>,
    pub destroyed: Vec<ShaderObjectHandle>,
    /// Number of create_shaders calls
    pub create_calls: usize,
    pub layouts_created: Vec<DeviceLayoutId>,
    pub layouts_destroyed: Vec<DeviceLayoutId>,
    /// Fail any creation call that contains a shader with this name
    pub fail_on: Option<String>,
    /// When failing, report the shaders before the failing one as created
    pub partial_failure: bool,
    /// When failing, report out of memory
    pub out_of_memory: bool,
}

impl MockShaderDevice {
    pub fn new() -> Self {
        Self::with_stages(StageFlags::ALL_GRAPHICS | StageFlags::COMPUTE)
    }

    pub fn with_stages(enabled: StageFlags) -> Self {
        Self {
            enabled,
            next_handle: 1,
            created: Vec::new(),
            destroyed: Vec::new(),
            create_calls: 0,
            layouts_created: Vec::new(),
            layouts_destroyed: Vec::new(),
            fail_on: None,
            partial_failure: false,
            out_of_memory: false,
        }
    }

    pub fn shared(self) -> Arc<Mutex<MockShaderDevice>> {
        Arc::new(Mutex::new(self))
    }

    /// Handles created and not yet destroyed
    pub fn live(&self) -> Vec<ShaderObjectHandle> {
        self.created.iter()
            .map(|c| c.handle)
            .filter(|h| !self.destroyed.contains(h))
            .collect()
    }

    fn allocate(&mut self) -> ShaderObjectHandle {
        let handle = ShaderObjectHandle::from_raw(self.next_handle).unwrap();
        self.next_handle += 1;
        handle
    }
}

impl ShaderDevice for MockShaderDevice {
    fn enabled_stages(&self) -> StageFlags {
        self.enabled
    }

    fn create_layout(&mut self, _desc: &ResourceLayoutDesc) -> Result<DeviceLayoutId> {
        let id = DeviceLayoutId(100 + self.layouts_created.len() as u64);
        self.layouts_created.push(id);
        Ok(id)
    }

    fn destroy_layout(&mut self, layout: DeviceLayoutId) {
        self.layouts_destroyed.push(layout);
    }

    fn create_shaders(
        &mut self,
        descs: &[ShaderCreateDesc<'_>],
    ) -> std::result::Result<Vec<ShaderObjectHandle>, ShaderCreateFailure> {
        self.create_calls += 1;

        let failing = self.fail_on.as_ref()
            .and_then(|name| descs.iter().position(|d| d.name == name));

        let mut handles = Vec::new();
        for (i, desc) in descs.iter().enumerate() {
            if Some(i) == failing {
                let mut partial: Vec<Option<ShaderObjectHandle>> = handles.into_iter().map(Some).collect();
                partial.resize(descs.len(), None);
                let error = if self.out_of_memory {
                    Error::OutOfMemory
                } else {
                    Error::BackendError(format!("mock rejected '{}'", desc.name))
                };
                return Err(ShaderCreateFailure { partial, error });
            }
            if failing.is_some() && !self.partial_failure {
                continue;
            }
            let handle = self.allocate();
            self.created.push(CreatedShader {
                handle,
                name: desc.name.to_string(),
                stage: desc.stage,
                link: desc.link,
            });
            handles.push(handle);
        }
        Ok(handles)
    }

    fn destroy_shader(&mut self, handle: ShaderObjectHandle) {
        self.destroyed.push(handle);
    }
}

// ============================================================================
// Mock Compiler
// ============================================================================

/// Compiles any source text that does not contain `#error`
#[derive(Debug, Default)]
pub struct MockCompiler {
    pub compiled: usize,
}

impl ShaderCompiler for MockCompiler {
    fn compile(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> std::result::Result<Vec<u8>, String> {
        if let Some(line) = source.lines().find(|l| l.contains("#error")) {
            return Err(format!("{:?} shader: {}", stage, line.trim()));
        }
        self.compiled += 1;
        Ok(format!("{:?}:{}:{}", stage, entry_point, source).into_bytes())
    }
}

// ============================================================================
// Mock Command Stream
// ============================================================================

/// One recorded stream command
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCommand {
    SetFixedFunction(FixedFunctionValue),
    BindStages(Vec<(ShaderStage, Option<ShaderObjectHandle>)>),
    PushConstants {
        layout: DeviceLayoutId,
        stages: StageFlags,
        offset: u32,
        size: usize,
    },
    Draw(String),
}

#[derive(Debug, Default)]
pub struct MockCommandStream {
    pub commands: Vec<StreamCommand>,
    /// Fail the next draw call with a backend error
    pub fail_next_draw: bool,
}

impl MockCommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn state_calls(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, StreamCommand::SetFixedFunction(_))).count()
    }

    pub fn bind_calls(&self) -> Vec<&Vec<(ShaderStage, Option<ShaderObjectHandle>)>> {
        self.commands.iter()
            .filter_map(|c| match c {
                StreamCommand::BindStages(bindings) => Some(bindings),
                _ => None,
            })
            .collect()
    }

    pub fn draw_calls(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, StreamCommand::Draw(_))).count()
    }
}

impl CommandStream for MockCommandStream {
    fn set_fixed_function(&mut self, value: FixedFunctionValue) -> Result<()> {
        self.commands.push(StreamCommand::SetFixedFunction(value));
        Ok(())
    }

    fn bind_stages(&mut self, stages: &[ShaderStage], shaders: &[Option<ShaderObjectHandle>]) -> Result<()> {
        self.commands.push(StreamCommand::BindStages(
            stages.iter().copied().zip(shaders.iter().copied()).collect()));
        Ok(())
    }

    fn push_constants(&mut self, layout: DeviceLayoutId, stages: StageFlags, offset: u32, data: &[u8]) -> Result<()> {
        self.commands.push(StreamCommand::PushConstants { layout, stages, offset, size: data.len() });
        Ok(())
    }

    fn draw(&mut self, model: &DrawModel) -> Result<()> {
        if self.fail_next_draw {
            self.fail_next_draw = false;
            return Err(Error::BackendError("mock draw failed".to_string()));
        }
        self.commands.push(StreamCommand::Draw(model.name.clone()));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn handle(raw: u64) -> ShaderObjectHandle {
    ShaderObjectHandle::from_raw(raw).unwrap()
}

/// Layout with one 64-byte vertex push constant range
pub fn transform_layout() -> ResourceLayoutDesc {
    ResourceLayoutDesc {
        set_layouts: Vec::new(),
        push_constant_ranges: vec![PushConstantRange {
            stages: StageFlags::VERTEX,
            offset: 0,
            size: 64,
        }],
    }
}

pub fn unit_desc(name: &str, stage: ShaderStage, next: StageFlags, category: &str) -> ShaderUnitDesc {
    ShaderUnitDesc {
        name: name.to_string(),
        stage,
        next_stages: next,
        source: ShaderSource::Text(format!("// {}\nvoid main() {{}}", name)),
        entry_point: "main".to_string(),
        layout_category: category.to_string(),
    }
}

/// Compile a unit against `layouts` with a fresh mock compiler
pub fn make_unit(layouts: &LayoutRegistry, name: &str, stage: ShaderStage, next: StageFlags, category: &str) -> ShaderUnit {
    ShaderUnit::new(unit_desc(name, stage, next, category), &mut MockCompiler::default(), layouts).unwrap()
}
