/// Draw module - per-stream binding tracking, state sequencing and draw lists

// Module declarations
pub mod fixed_function;
pub mod command_stream;
pub mod binding_tracker;
pub mod state_sequencer;
pub mod recording_stream;
pub mod draw_list;

// Re-export everything
pub use fixed_function::*;
pub use command_stream::*;
pub use binding_tracker::*;
pub use state_sequencer::*;
pub use recording_stream::*;
pub use draw_list::*;
