/// RecordingStream - one command stream paired with its own StateSequencer
///
/// Binding and fixed-function snapshots are never shared between streams:
/// each stream records independently, single-threaded.

use crate::error::Result;
use crate::shader::StageFlags;
use crate::draw::{
    CommandStream, StateSequencer, SequencerState, DrawRequest, DrawEmission,
    FixedFunctionState,
};

pub struct RecordingStream<C: CommandStream> {
    stream: C,
    sequencer: StateSequencer,
}

impl<C: CommandStream> RecordingStream<C> {
    /// Wrap a command stream
    ///
    /// # Arguments
    ///
    /// * `stream` - Backend command stream
    /// * `enabled` - Stages the device exposes
    /// * `batch_binds` - Emit one bind call per draw instead of one per stage
    pub fn new(stream: C, enabled: StageFlags, batch_binds: bool) -> Self {
        Self {
            stream,
            sequencer: StateSequencer::new(enabled, batch_binds),
        }
    }

    /// Start a new recording sequence with `initial` as base state
    ///
    /// Must be called after every restart of the backend stream (for Vulkan,
    /// after `VulkanCommandStream::begin`). A restarted command buffer holds
    /// no bindings or dynamic state, while the sequencer would still skip
    /// everything its snapshot remembers. Prefer `restart`, which does both
    /// in order.
    pub fn begin(&mut self, initial: FixedFunctionState) -> Result<()> {
        self.sequencer.reset();
        self.sequencer.set_initial_state(initial)
    }

    /// Restart the backend stream with `restart_stream`, then `begin`
    ///
    /// When the backend restart fails the recording is aborted, since the
    /// stream contents are unknown.
    ///
    /// ```ignore
    /// recording.restart(FixedFunctionState::default(), |stream| stream.begin(extent))?;
    /// ```
    pub fn restart<F>(&mut self, initial: FixedFunctionState, restart_stream: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> Result<()>,
    {
        if let Err(error) = restart_stream(&mut self.stream) {
            self.sequencer.abort(&error);
            return Err(error);
        }
        self.begin(initial)
    }

    /// Record one draw (minimal state/bind delta, then the draw)
    pub fn draw(&mut self, request: &DrawRequest<'_>) -> Result<DrawEmission> {
        self.sequencer.draw(&mut self.stream, request)
    }

    pub fn is_aborted(&self) -> bool {
        self.sequencer.state() == SequencerState::Aborted
    }

    pub fn stream(&self) -> &C {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut C {
        &mut self.stream
    }

    pub fn sequencer(&self) -> &StateSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut StateSequencer {
        &mut self.sequencer
    }

    /// Give the command stream back (e.g., to submit it)
    pub fn into_inner(self) -> C {
        self.stream
    }
}

#[cfg(test)]
#[path = "recording_stream_tests.rs"]
mod tests;
