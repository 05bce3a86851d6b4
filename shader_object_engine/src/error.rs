//! Error types for the shader object engine
//!
//! This module defines the error types used throughout the engine,
//! covering shader compilation, shader object creation, stage binding
//! and resource layout validation.

use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Source did not compile (or bytecode failed validation)
    CompilationFailure {
        /// Name of the offending shader unit
        unit: String,
        /// Compiler message
        message: String,
    },

    /// The device rejected shader object creation
    ///
    /// Linked creation reports every unit of the group.
    CreationFailure {
        /// Names of the units involved in the creation call
        units: Vec<String>,
        /// Driver or validation message
        message: String,
    },

    /// A draw or bind broke the stage binding contract
    ///
    /// Programming error: the current recording must be abandoned.
    BindingContractViolation(String),

    /// Units used together declare different resource layouts
    LayoutMismatch(String),

    /// A linked unit was combined without its exact link partners
    LinkViolation(String),

    /// Invalid resource (unknown key, duplicate name, bad declaration)
    InvalidResource(String),

    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU or host memory
    OutOfMemory,
}

impl Error {
    /// Whether this error aborts the current frame's recording
    ///
    /// Compilation, creation and layout errors are startup-time failures that
    /// only exclude the affected permutation.
    pub fn is_fatal_for_frame(&self) -> bool {
        matches!(self, Error::BindingContractViolation(_) | Error::BackendError(_) | Error::OutOfMemory)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CompilationFailure { unit, message } => {
                write!(f, "Compilation failed for '{}': {}", unit, message)
            }
            Error::CreationFailure { units, message } => {
                write!(f, "Shader object creation failed for [{}]: {}", units.join(", "), message)
            }
            Error::BindingContractViolation(msg) => write!(f, "Binding contract violation: {}", msg),
            Error::LayoutMismatch(msg) => write!(f, "Layout mismatch: {}", msg),
            Error::LinkViolation(msg) => write!(f, "Link violation: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
