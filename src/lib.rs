// Core infrastructure modules
pub mod core {
    pub mod config;
    pub mod errors;
}

pub mod gate; // Pause/fail/completion coordination
pub mod flow; // Phase and sequence execution
pub mod command; // Run wrapper with output forwarding

// Re-exports for convenience
pub use crate::command::{Command, RunReport, RunState};
pub use crate::core::config::CommandConfig;
pub use crate::core::errors::{PhaseflowError, Result};
pub use crate::flow::{
    first_just, mainly, sequence_of, Phase, PhaseBuilder, RunAll, Sequence, SequenceBuilder, Step,
};
pub use crate::gate::{Gate, ReadyToken};
