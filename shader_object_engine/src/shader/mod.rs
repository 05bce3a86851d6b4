/// Shader module - shader units, resource layouts and shader object creation

// Module declarations
pub mod stage;
pub mod device;
pub mod layout;
pub mod compiler;
pub mod unit;
pub mod builder;

// Re-export everything
pub use stage::*;
pub use device::*;
pub use layout::*;
pub use compiler::*;
pub use unit::*;
pub use builder::*;
