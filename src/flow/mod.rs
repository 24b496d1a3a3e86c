pub mod builder;
pub mod phase;
pub mod sequence;
pub mod step;

pub use builder::{first_just, mainly, sequence_of, PhaseBuilder, SequenceBuilder};
pub use phase::Phase;
pub use sequence::{RunAll, Sequence};
pub use step::Step;
