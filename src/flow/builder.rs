//! Fluent construction of phase/sequence trees.
//!
//! ```
//! use phaseflow::flow::builder::{first_just, mainly};
//!
//! let seq = mainly(|| async { anyhow::Ok(()) })
//!     .also(first_just(|| async { anyhow::Ok(()) }).then_just(|| async { anyhow::Ok(()) }))
//!     .also_just(|| async { anyhow::Ok(()) })
//!     .end();
//! assert_eq!(seq.len(), 1);
//! ```
//!
//! Builders produce the same [`Phase`] and [`Sequence`] values as the direct
//! constructors; nothing about how a tree runs depends on how it was built.

use super::phase::Phase;
use super::sequence::{Sequence, Steps};
use super::step::Step;
use std::sync::Arc;

const DEFAULT_SEQUENCES: usize = 4;
const DEFAULT_PHASES: usize = 4;

/// Builder for a single phase: a main step plus optional child sequences.
#[derive(Debug)]
pub struct PhaseBuilder {
    phase: Phase,
}

/// Starts a phase with `step` as its main body.
pub fn mainly<S: Step + 'static>(step: S) -> PhaseBuilder {
    let mut phase = Phase::new(step);
    phase.children.reserve(DEFAULT_SEQUENCES);
    PhaseBuilder { phase }
}

impl PhaseBuilder {
    pub fn named<S: Into<String>>(mut self, label: S) -> Self {
        self.phase = self.phase.labeled(label);
        self
    }

    /// Adds a child sequence, run concurrently with the main body.
    pub fn also(mut self, sequence: SequenceBuilder) -> Self {
        self.phase.children.push(Arc::new(sequence.finish()));
        self
    }

    /// Adds `step` as a child sequence of its own.
    pub fn also_just<S: Step + 'static>(self, step: S) -> Self {
        self.also(first_just(step))
    }

    /// Finishes building: a runnable sequence holding just this phase.
    pub fn end(self) -> Sequence {
        sequence_of(self).end()
    }

    fn finish(self) -> Phase {
        self.phase
    }
}

impl From<PhaseBuilder> for Phase {
    fn from(builder: PhaseBuilder) -> Self {
        builder.finish()
    }
}

/// Builder for an ordered list of phases.
#[derive(Debug)]
pub struct SequenceBuilder {
    phases: Vec<Phase>,
}

/// Starts a sequence with `phase` as its first phase.
pub fn sequence_of(phase: PhaseBuilder) -> SequenceBuilder {
    let mut phases = Vec::with_capacity(DEFAULT_PHASES);
    phases.push(phase.finish());
    SequenceBuilder { phases }
}

/// Starts a sequence whose first phase is just `step`.
pub fn first_just<S: Step + 'static>(step: S) -> SequenceBuilder {
    sequence_of(mainly(step))
}

impl SequenceBuilder {
    /// Appends a phase.
    pub fn then(mut self, phase: PhaseBuilder) -> Self {
        self.phases.push(phase.finish());
        self
    }

    /// Appends a phase that is just `step`.
    pub fn then_just<S: Step + 'static>(self, step: S) -> Self {
        self.then(mainly(step))
    }

    pub fn end(self) -> Sequence {
        Sequence::from_steps(self.finish())
    }

    fn finish(self) -> Steps {
        Steps::new(self.phases)
    }
}
