/*!
# Shader Object Engine

Binding and state tracking for GPUs that create shader stages as independent
shader objects instead of monolithic pipelines.

Shader units are compiled once, built into shader objects (singly or as a
linked vertex + fragment pair), and bound per draw with only the minimal
delta of stage bindings and fixed-function state.

## Architecture

- **ShaderUnit**: one compiled program with its stage, allowed next stages and layout
- **ShaderBuilder**: creates shader objects, linked groups all-or-nothing
- **BindingTracker**: per-stream stage binding state and coverage check
- **StateSequencer**: per-draw minimal state/bind emission
- **ShaderRegistry**: facade owning units, layouts and permutations
- **ShaderDevice** / **CommandStream** / **ShaderCompiler**: backend traits

Backend implementations (e.g., Vulkan with `VK_EXT_shader_object`) provide
concrete types that implement these traits.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod shader;
pub mod draw;
pub mod registry;

#[cfg(test)]
mod mock_backend;


// Main shobj namespace module
pub mod shobj {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging hub
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::Config;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Shader units, layouts and device traits
    pub mod shader {
        pub use crate::shader::*;
    }

    // Per-stream binding and state sequencing
    pub mod draw {
        pub use crate::draw::*;
    }

    // Registry facade
    pub use crate::registry::{ShaderRegistry, ShaderSet, ShaderUnitKey, Permutation};
}

// Re-export math library at crate root
pub use glam;
