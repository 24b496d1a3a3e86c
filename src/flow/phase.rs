use super::sequence::{Sequence, Steps};
use super::step::Step;
use crate::core::errors::PhaseflowError;
use crate::gate::{Gate, ReadyToken};
use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// One body step plus the child sequences that run alongside it.
///
/// When run, a phase waits for its gate to be ready, starts every child
/// sequence on its own task with a forked gate, runs the body on the calling
/// task, then waits for the children. A failing body fails the whole run and
/// returns at once; children already started stop at their next checkpoint.
pub struct Phase {
    pub(crate) label: Option<String>,
    pub(crate) body: Box<dyn Step>,
    pub(crate) children: Vec<Arc<Steps>>,
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("label", &self.label)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Repays a child's completion credit on the parent handle, even if the
/// child task unwinds.
struct Completion(Gate);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.complete();
    }
}

impl Phase {
    pub fn new<S: Step + 'static>(body: S) -> Self {
        Self {
            label: None,
            body: Box::new(body),
            children: Vec::new(),
        }
    }

    /// Attach a label, used in log spans and failure reports.
    pub fn labeled<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a child sequence to run concurrently with the body.
    pub fn with_child(mut self, child: Sequence) -> Self {
        self.children.push(child.steps());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn name(&self) -> &str {
        self.label.as_deref().unwrap_or("unlabeled")
    }

    pub(crate) async fn run(&self, gate: Gate) -> Gate {
        let Some(token) = gate.ready().await else {
            debug!("Run already failed, phase not started");
            return gate;
        };
        let spawned = self.spawn_children(&gate, &token);
        token.release();
        debug!(spawned, "Phase started");

        let outcome = AssertUnwindSafe(self.body.run())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(anyhow!("step panicked: {}", panic_message(&*payload)))
            });

        if let Err(err) = outcome {
            warn!(error = %format!("{:#}", err), "Step failed");
            if gate
                .fail_because(PhaseflowError::step_failed(self.name(), err))
                .await
                .is_err()
            {
                debug!("Run had already failed");
            }
            return gate;
        }

        if let Some(token) = gate.ready().await {
            token.release();
        }
        gate
    }

    /// Start every child sequence on its own task.
    ///
    /// A credit is registered on `gate` right before each spawn, so a child
    /// that is never started never holds one.
    fn spawn_children(&self, gate: &Gate, token: &ReadyToken) -> usize {
        // The token's read guard keeps `fail` out until it is released.
        debug_assert!(!token.has_failed());
        let mut spawned = 0;
        for child in &self.children {
            gate.register(1);
            let completion = Completion(gate.clone());
            let fork = gate.fork();
            let child = Arc::clone(child);

            tokio::spawn(
                async move {
                    let _completion = completion;
                    child.run(fork).await;
                }
                .in_current_span(),
            );
            spawned += 1;
        }
        spawned
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown payload"
    }
}
