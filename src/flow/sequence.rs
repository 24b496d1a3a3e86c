use super::phase::Phase;
use crate::gate::Gate;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, Instrument};

/// Something that runs a whole tree of steps against a gate.
#[async_trait]
pub trait RunAll: Send + Sync {
    /// Run to completion or failure and hand the gate back.
    async fn run_all(&self, gate: Gate) -> Gate;

    /// Whether a run is currently in progress. Never blocks.
    fn is_running(&self) -> bool;
}

/// Phases executed one at a time, sharing a single gate handle.
#[derive(Debug)]
pub(crate) struct Steps {
    phases: Vec<Phase>,
}

impl Steps {
    pub(crate) fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    pub(crate) fn len(&self) -> usize {
        self.phases.len()
    }

    // Boxed because phases spawn child sequences, which makes the future
    // type recursive.
    pub(crate) fn run(self: Arc<Self>, mut gate: Gate) -> BoxFuture<'static, Gate> {
        async move {
            for (index, phase) in self.phases.iter().enumerate() {
                let span = info_span!("phase", index, label = phase.name());
                gate = phase.run(gate).instrument(span).await;
                if gate.has_failed().await {
                    debug!(
                        index,
                        skipped = self.phases.len() - index - 1,
                        "Sequence stopped after failure"
                    );
                    break;
                }
            }
            gate
        }
        .boxed()
    }
}

/// A runnable sequence of phases.
///
/// Clones share the same steps and the same running guard: concurrent
/// [`Sequence::run_all`] calls on clones wait for each other.
#[derive(Debug, Clone)]
pub struct Sequence {
    steps: Arc<Steps>,
    running: Arc<Mutex<()>>,
}

impl Sequence {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self::from_steps(Steps::new(phases))
    }

    pub(crate) fn from_steps(steps: Steps) -> Self {
        Self {
            steps: Arc::new(steps),
            running: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) fn steps(&self) -> Arc<Steps> {
        Arc::clone(&self.steps)
    }

    /// Number of top-level phases.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.len() == 0
    }

    /// Run every phase in order, stopping at the first observed failure.
    ///
    /// If another run of this sequence is in progress, waits for it to
    /// finish first.
    pub async fn run_all(&self, gate: Gate) -> Gate {
        let _running = self.running.lock().await;
        info!(phases = self.len(), "Sequence started");

        let gate = self.steps().run(gate).await;

        let failed = gate.has_failed().await;
        info!(failed, "Sequence finished");
        gate
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }
}

#[async_trait]
impl RunAll for Sequence {
    async fn run_all(&self, gate: Gate) -> Gate {
        Sequence::run_all(self, gate).in_current_span().await
    }

    fn is_running(&self) -> bool {
        Sequence::is_running(self)
    }
}
