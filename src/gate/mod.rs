//! Coordination gate
//!
//! A [`Gate`] combines three things behind one lock:
//! - a completion counter (how many child branches this handle still waits for),
//! - a pause switch that holds back new work without cancelling running work,
//! - a one-way failure latch.
//!
//! Handles created with [`Gate::fork`] share the pause switch and the failure
//! latch with their origin but own a fresh completion counter, so a phase can
//! wait for its own children without being entangled with sibling subtrees.
//! Cloning a handle does not fork it: clones share the same counter.

use crate::core::errors::{PhaseflowError, Result};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedRwLockReadGuard, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct Flags {
    paused: bool,
    failed: bool,
    cause: Option<Arc<PhaseflowError>>,
}

/// State shared by an origin handle and every handle forked from it
#[derive(Debug, Default)]
struct Shared {
    flags: Arc<RwLock<Flags>>,
    changed: Notify,
}

/// A handle onto the pause/fail/completion state of a run
#[derive(Debug, Clone)]
pub struct Gate {
    shared: Arc<Shared>,
    pending: Arc<AtomicIsize>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Create an origin handle: not paused, not failed, nothing pending.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            pending: Arc::new(AtomicIsize::new(0)),
        }
    }

    /// Create a handle bound to the same pause/fail state, with its own
    /// completion counter starting at zero.
    pub fn fork(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            pending: Arc::new(AtomicIsize::new(0)),
        }
    }

    /// Whether both handles observe the same pause/fail state.
    pub fn shares_state_with(&self, other: &Gate) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Wait until this handle is ready or the run has failed.
    ///
    /// Ready means nothing is pending on this handle and the run is not
    /// paused. Returns `None` once a failure has been recorded, otherwise a
    /// [`ReadyToken`] that keeps pause, resume and fail out until released.
    pub async fn ready(&self) -> Option<ReadyToken> {
        loop {
            // Register interest before reading the state so a change made
            // between the check and the wait still wakes us.
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let flags = Arc::clone(&self.shared.flags).read_owned().await;
            if flags.failed {
                return None;
            }
            if !flags.paused && self.pending() == 0 {
                return Some(ReadyToken { flags });
            }
            drop(flags);

            notified.await;
        }
    }

    /// Hold back new work. Returns whether the gate was already paused.
    pub async fn pause(&self) -> Result<bool> {
        let mut flags = self.shared.flags.write().await;
        if flags.failed {
            return Err(PhaseflowError::already_failed("pause"));
        }
        let was_paused = std::mem::replace(&mut flags.paused, true);
        drop(flags);

        self.shared.changed.notify_waiters();
        debug!(was_paused, "Gate paused");
        Ok(was_paused)
    }

    /// Undo a pause. Returns whether the gate was paused.
    pub async fn resume(&self) -> Result<bool> {
        let mut flags = self.shared.flags.write().await;
        if flags.failed {
            return Err(PhaseflowError::already_failed("resume"));
        }
        let was_paused = std::mem::replace(&mut flags.paused, false);
        drop(flags);

        self.shared.changed.notify_waiters();
        debug!(was_paused, "Gate resumed");
        Ok(was_paused)
    }

    /// Record a failure. Only the first call succeeds; the latch never resets.
    pub async fn fail(&self) -> Result<()> {
        self.latch(None).await
    }

    /// Record a failure together with its cause.
    ///
    /// The cause is kept only if this call is the one that trips the latch.
    pub async fn fail_because(&self, cause: PhaseflowError) -> Result<()> {
        self.latch(Some(cause)).await
    }

    async fn latch(&self, cause: Option<PhaseflowError>) -> Result<()> {
        let mut flags = self.shared.flags.write().await;
        if flags.failed {
            return Err(PhaseflowError::already_failed("fail"));
        }
        flags.failed = true;
        flags.cause = cause.map(Arc::new);
        drop(flags);

        self.shared.changed.notify_waiters();
        debug!("Gate failed");
        Ok(())
    }

    pub async fn has_failed(&self) -> bool {
        self.shared.flags.read().await.failed
    }

    pub async fn is_paused(&self) -> bool {
        self.shared.flags.read().await.paused
    }

    /// The cause recorded by [`Gate::fail_because`], if any.
    pub async fn failure(&self) -> Option<Arc<PhaseflowError>> {
        self.shared.flags.read().await.cause.clone()
    }

    /// Add `delta` to this handle's completion counter.
    ///
    /// # Panics
    ///
    /// Panics if the counter would drop below zero. That means more
    /// completions were reported than were registered.
    pub fn register(&self, delta: isize) {
        let now = self.pending.fetch_add(delta, Ordering::AcqRel) + delta;
        assert!(now >= 0, "gate completion counter went negative ({})", now);
        if now == 0 {
            self.shared.changed.notify_waiters();
        }
    }

    /// Report one registered branch as finished.
    pub fn complete(&self) {
        self.register(-1);
    }

    /// Branches still outstanding on this handle.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire).max(0) as usize
    }
}

/// Proof that a [`Gate`] was ready.
///
/// While any token is alive, `pause`, `resume` and `fail` wait. Dropping the
/// token releases it; [`ReadyToken::release`] does the same explicitly.
#[must_use = "a ready token holds back pause, resume and fail until released"]
#[derive(Debug)]
pub struct ReadyToken {
    flags: OwnedRwLockReadGuard<Flags>,
}

impl ReadyToken {
    /// Failure state as seen while holding the token.
    pub fn has_failed(&self) -> bool {
        self.flags.failed
    }

    pub fn release(self) {}
}
