/// BindingTracker - per-stream record of what is bound to each stage
///
/// Every enabled graphics stage must be either bound or explicitly unbound
/// before a draw. A stage that has not been touched since the stream was
/// reset has undefined state on the GPU and fails the coverage check.

use crate::error::{Error, Result};
use crate::shader::{ShaderStage, StageFlags, ShaderObjectHandle, STAGE_COUNT};
use crate::draw::CommandStream;

/// Binding state of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageBinding {
    /// Not bound or unbound since the stream was reset
    Untouched,
    /// Bound to a shader object
    Bound(ShaderObjectHandle),
    /// Explicitly bound to null
    Unbound,
}

impl StageBinding {
    /// Whether this state already equals the desired binding (None = unbound)
    pub fn matches(&self, desired: Option<ShaderObjectHandle>) -> bool {
        match (self, desired) {
            (StageBinding::Bound(current), Some(wanted)) => *current == wanted,
            (StageBinding::Unbound, None) => true,
            _ => false,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, StageBinding::Untouched)
    }
}

/// Stage binding tracker for one command stream
#[derive(Debug, Clone)]
pub struct BindingTracker {
    enabled: StageFlags,
    states: [StageBinding; STAGE_COUNT],
}

impl BindingTracker {
    /// Create a tracker for the stages a device exposes
    pub fn new(enabled: StageFlags) -> Self {
        Self {
            enabled,
            states: [StageBinding::Untouched; STAGE_COUNT],
        }
    }

    /// Forget every binding (start of a new recording sequence)
    pub fn reset(&mut self) {
        self.states = [StageBinding::Untouched; STAGE_COUNT];
    }

    pub fn enabled_stages(&self) -> StageFlags {
        self.enabled
    }

    /// Current binding state of `stage`
    pub fn state(&self, stage: ShaderStage) -> StageBinding {
        self.states[stage.index()]
    }

    /// Bind `handle` to `stage` with a single-stage bind call
    pub fn bind(&mut self, stream: &mut dyn CommandStream, stage: ShaderStage, handle: ShaderObjectHandle) -> Result<()> {
        self.bind_batch(stream, &[(stage, Some(handle))])
    }

    /// Bind null to `stage`, marking it explicitly unbound
    pub fn unbind(&mut self, stream: &mut dyn CommandStream, stage: ShaderStage) -> Result<()> {
        self.bind_batch(stream, &[(stage, None)])
    }

    /// Bind several stages in one stream call
    ///
    /// Equivalent to calling `bind`/`unbind` per entry.
    ///
    /// # Errors
    ///
    /// `BindingContractViolation` if a stage is not enabled on the device or
    /// appears twice. Stream errors leave the affected stages `Untouched`.
    pub fn bind_batch(
        &mut self,
        stream: &mut dyn CommandStream,
        bindings: &[(ShaderStage, Option<ShaderObjectHandle>)],
    ) -> Result<()> {
        let mut seen = StageFlags::empty();
        for (stage, _) in bindings {
            if !self.enabled.contains(stage.flag()) {
                crate::engine_bail!("shobj::BindingTracker",
                    error = Error::BindingContractViolation(format!(
                        "Stage {:?} is not enabled on this device", stage)));
            }
            if seen.contains(stage.flag()) {
                crate::engine_bail!("shobj::BindingTracker",
                    error = Error::BindingContractViolation(format!(
                        "Stage {:?} bound twice in one call", stage)));
            }
            seen |= stage.flag();
        }

        let stages: Vec<ShaderStage> = bindings.iter().map(|(s, _)| *s).collect();
        let shaders: Vec<Option<ShaderObjectHandle>> = bindings.iter().map(|(_, h)| *h).collect();

        if let Err(error) = stream.bind_stages(&stages, &shaders) {
            for stage in &stages {
                self.states[stage.index()] = StageBinding::Untouched;
            }
            return Err(error);
        }

        for (stage, handle) in bindings {
            self.states[stage.index()] = match handle {
                Some(handle) => StageBinding::Bound(*handle),
                None => StageBinding::Unbound,
            };
        }
        Ok(())
    }

    /// Enabled graphics stages whose state is still undefined
    pub fn undefined_stages(&self) -> StageFlags {
        (self.enabled & StageFlags::ALL_GRAPHICS)
            .stages()
            .filter(|s| !self.states[s.index()].is_defined())
            .fold(StageFlags::empty(), |acc, s| acc | s.flag())
    }

    pub fn is_fully_bound(&self) -> bool {
        self.undefined_stages().is_empty()
    }

    /// Check that every enabled graphics stage is bound or explicitly unbound
    ///
    /// # Errors
    ///
    /// `BindingContractViolation` listing the undefined stages.
    pub fn assert_fully_bound(&self) -> Result<()> {
        let undefined = self.undefined_stages();
        if !undefined.is_empty() {
            let names: Vec<String> = undefined.stages().map(|s| format!("{:?}", s)).collect();
            crate::engine_bail!("shobj::BindingTracker",
                error = Error::BindingContractViolation(format!(
                    "Stages with undefined binding before draw: {}", names.join(", "))));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "binding_tracker_tests.rs"]
mod tests;
