/// StateSequencer - minimal-delta state and binding emission per draw
///
/// Owns the BindingTracker and DrawStateSnapshot of one command stream. For
/// each draw it emits only the fixed-function values and stage bindings that
/// differ from what the stream already holds, then the draw itself.
///
/// State machine (per stream):
///
/// ```text
/// Empty --set_initial_state--> Configured --draw--> Drawing --draw--> Drawing
///   ^                                                                   |
///   +------------------------------- reset ----------------------------+
/// any --contract violation / stream error--> Aborted --reset--> Empty
/// ```

use crate::error::{Error, Result};
use crate::shader::{ShaderStage, StageFlags, ShaderObjectHandle, DeviceLayoutId, STAGE_COUNT};
use crate::draw::{
    BindingTracker, CommandStream, DrawModel, DrawStateSnapshot,
    FixedFunctionOverrides, FixedFunctionState, FIXED_FUNCTION_VALUE_COUNT,
};

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Stream reset, no initial state yet
    Empty,
    /// Initial state set, no draw yet
    Configured,
    /// At least one draw recorded
    Drawing,
    /// A draw broke the binding contract; refuses draws until reset
    Aborted,
}

/// Desired binding per stage for one draw (None = explicitly unbound)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageRequirements {
    handles: [Option<ShaderObjectHandle>; STAGE_COUNT],
}

impl StageRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: ShaderStage, handle: ShaderObjectHandle) -> Self {
        self.handles[stage.index()] = Some(handle);
        self
    }

    pub fn set(&mut self, stage: ShaderStage, handle: Option<ShaderObjectHandle>) {
        self.handles[stage.index()] = handle;
    }

    pub fn get(&self, stage: ShaderStage) -> Option<ShaderObjectHandle> {
        self.handles[stage.index()]
    }

    /// Stages that require a bound shader object
    pub fn bound_stages(&self) -> StageFlags {
        ShaderStage::ALL.iter()
            .filter(|s| self.handles[s.index()].is_some())
            .fold(StageFlags::empty(), |acc, s| acc | s.flag())
    }
}

/// Push constant update issued right before the draw
#[derive(Debug, Clone, Copy)]
pub struct PushConstantData<'a> {
    pub layout: DeviceLayoutId,
    pub stages: StageFlags,
    pub offset: u32,
    pub data: &'a [u8],
}

/// Last push constant update a stream received
#[derive(Debug, Clone, PartialEq, Eq)]
struct PushedConstants {
    layout: DeviceLayoutId,
    stages: StageFlags,
    offset: u32,
    data: Vec<u8>,
}

impl PushedConstants {
    fn matches(&self, push: &PushConstantData<'_>) -> bool {
        self.layout == push.layout
            && self.stages == push.stages
            && self.offset == push.offset
            && self.data == push.data
    }
}

/// Everything one draw needs
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub model: &'a DrawModel,
    pub stages: StageRequirements,
    pub overrides: FixedFunctionOverrides,
    pub push_constants: Option<PushConstantData<'a>>,
}

/// Calls emitted for one draw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawEmission {
    /// set_fixed_function calls
    pub fixed_function_calls: u32,
    /// bind_stages calls (one per stage, or one per draw when batched)
    pub bind_calls: u32,
    /// Stages whose binding changed
    pub stages_rebound: StageFlags,
    pub push_constant_calls: u32,
    pub draw_calls: u32,
}

/// Counters for one recording sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub draws: u32,
    pub fixed_function_calls: u32,
    pub bind_calls: u32,
    /// Fixed-function values not re-emitted because the snapshot already had them
    pub redundant_values_skipped: u32,
    /// Stage bindings not re-emitted because the tracker already had them
    pub redundant_binds_skipped: u32,
    /// Push constant updates identical to the previous one
    pub redundant_pushes_skipped: u32,
}

/// Minimal-delta sequencer for one command stream
#[derive(Debug, Clone)]
pub struct StateSequencer {
    tracker: BindingTracker,
    snapshot: DrawStateSnapshot,
    initial_state: Option<FixedFunctionState>,
    state: SequencerState,
    batch_binds: bool,
    last_push: Option<PushedConstants>,
    stats: SequencerStats,
}

impl StateSequencer {
    /// Create a sequencer
    ///
    /// # Arguments
    ///
    /// * `enabled` - Stages the device exposes (tracked for coverage)
    /// * `batch_binds` - Emit one bind call per draw instead of one per stage
    pub fn new(enabled: StageFlags, batch_binds: bool) -> Self {
        Self {
            tracker: BindingTracker::new(enabled),
            snapshot: DrawStateSnapshot::new(),
            initial_state: None,
            state: SequencerState::Empty,
            batch_binds,
            last_push: None,
            stats: SequencerStats::default(),
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn tracker(&self) -> &BindingTracker {
        &self.tracker
    }

    pub fn snapshot(&self) -> &DrawStateSnapshot {
        &self.snapshot
    }

    pub fn stats(&self) -> SequencerStats {
        self.stats
    }

    pub fn initial_state(&self) -> Option<&FixedFunctionState> {
        self.initial_state.as_ref()
    }

    /// Return to `Empty` (start of a new recording sequence)
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.snapshot.clear();
        self.initial_state = None;
        self.state = SequencerState::Empty;
        self.last_push = None;
        self.stats = SequencerStats::default();
        crate::engine_trace!("shobj::StateSequencer", "Stream reset");
    }

    /// Set the base fixed-function state draws override (`Empty`/`Configured` only)
    pub fn set_initial_state(&mut self, state: FixedFunctionState) -> Result<()> {
        match self.state {
            SequencerState::Empty | SequencerState::Configured => {
                self.initial_state = Some(state);
                self.state = SequencerState::Configured;
                Ok(())
            }
            other => {
                crate::engine_bail!("shobj::StateSequencer",
                    error = Error::BindingContractViolation(format!(
                        "Initial state can only be set on a reset stream (state is {:?})", other)));
            }
        }
    }

    /// Abandon the current recording
    pub fn abort(&mut self, reason: &Error) {
        if self.state != SequencerState::Aborted {
            crate::engine_error!("shobj::StateSequencer", "Recording aborted: {}", reason);
        }
        self.state = SequencerState::Aborted;
    }

    /// Emit the state/bind delta for `request`, then draw
    ///
    /// # Errors
    ///
    /// `BindingContractViolation` when drawing outside `Configured`/`Drawing`,
    /// when a required stage is not enabled, when no vertex shader is
    /// required, or when an enabled stage is still undefined. Any error
    /// (including stream errors) moves the sequencer to `Aborted`.
    pub fn draw(&mut self, stream: &mut dyn CommandStream, request: &DrawRequest<'_>) -> Result<DrawEmission> {
        let base = match (self.state, self.initial_state) {
            (SequencerState::Configured | SequencerState::Drawing, Some(base)) => base,
            (SequencerState::Aborted, _) => {
                crate::engine_bail!("shobj::StateSequencer",
                    error = Error::BindingContractViolation(
                        "Recording was aborted; reset the stream before drawing".to_string()));
            }
            (state, _) => {
                let error = Error::BindingContractViolation(format!(
                    "Draw '{}' issued before set_initial_state (state is {:?})", request.model.name, state));
                self.abort(&error);
                return Err(error);
            }
        };

        match self.emit(stream, request, &base) {
            Ok(emission) => {
                self.state = SequencerState::Drawing;
                Ok(emission)
            }
            Err(error) => {
                self.abort(&error);
                Err(error)
            }
        }
    }

    fn emit(
        &mut self,
        stream: &mut dyn CommandStream,
        request: &DrawRequest<'_>,
        base: &FixedFunctionState,
    ) -> Result<DrawEmission> {
        let required = request.stages.bound_stages();
        if !required.contains(StageFlags::VERTEX) {
            return Err(Error::BindingContractViolation(format!(
                "Draw '{}' has no vertex shader", request.model.name)));
        }
        let graphics = self.tracker.enabled_stages() & StageFlags::ALL_GRAPHICS;
        let unsupported = required - graphics;
        if !unsupported.is_empty() {
            return Err(Error::BindingContractViolation(format!(
                "Draw '{}' requires stages {:?} which are not enabled", request.model.name, unsupported)));
        }

        let mut emission = DrawEmission::default();

        // Fixed-function delta
        let target = request.overrides.apply(base);
        let changes = target.diff(self.snapshot.state());
        if !self.snapshot.is_empty() {
            self.stats.redundant_values_skipped += (FIXED_FUNCTION_VALUE_COUNT - changes.len()) as u32;
        }
        for value in changes {
            stream.set_fixed_function(value)?;
            emission.fixed_function_calls += 1;
        }
        self.snapshot.record(target);

        // Stage binding delta
        let mut pending = Vec::new();
        for stage in graphics.stages() {
            let desired = request.stages.get(stage);
            if self.tracker.state(stage).matches(desired) {
                self.stats.redundant_binds_skipped += 1;
            } else {
                pending.push((stage, desired));
                emission.stages_rebound |= stage.flag();
            }
        }
        if self.batch_binds {
            if !pending.is_empty() {
                self.tracker.bind_batch(stream, &pending)?;
                emission.bind_calls += 1;
            }
        } else {
            for (stage, desired) in pending {
                match desired {
                    Some(handle) => self.tracker.bind(stream, stage, handle)?,
                    None => self.tracker.unbind(stream, stage)?,
                }
                emission.bind_calls += 1;
            }
        }

        self.tracker.assert_fully_bound()?;

        // Push constants persist in the stream until overwritten
        if let Some(push) = &request.push_constants {
            if self.last_push.as_ref().is_some_and(|last| last.matches(push)) {
                self.stats.redundant_pushes_skipped += 1;
            } else {
                stream.push_constants(push.layout, push.stages, push.offset, push.data)?;
                emission.push_constant_calls += 1;
                self.last_push = Some(PushedConstants {
                    layout: push.layout,
                    stages: push.stages,
                    offset: push.offset,
                    data: push.data.to_vec(),
                });
            }
        }

        stream.draw(request.model)?;
        emission.draw_calls = 1;

        self.stats.draws += 1;
        self.stats.fixed_function_calls += emission.fixed_function_calls;
        self.stats.bind_calls += emission.bind_calls;

        crate::engine_trace!("shobj::StateSequencer",
            "Draw '{}': {} state call(s), {} bind call(s)",
            request.model.name, emission.fixed_function_calls, emission.bind_calls);
        Ok(emission)
    }
}

#[cfg(test)]
#[path = "state_sequencer_tests.rs"]
mod tests;
