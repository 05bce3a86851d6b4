/// Engine configuration

use crate::shader::StageFlags;
use crate::draw::FixedFunctionState;

/// Shader registry and recording configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Graphics stages the application covers
    ///
    /// Streams track every stage the device enables; `begin_stream` rejects
    /// a value missing any of the device's graphics stages.
    pub enabled_stages: StageFlags,

    /// Emit one batched bind call per draw instead of one call per stage
    pub batch_stage_binds: bool,

    /// Base fixed-function state every recording starts from
    pub initial_state: FixedFunctionState,

    /// Sort draw lists by shader/state key before recording
    pub sort_draws: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled_stages: StageFlags::ALL_GRAPHICS,
            batch_stage_binds: false,
            initial_state: FixedFunctionState::default(),
            sort_draws: true,
        }
    }
}
