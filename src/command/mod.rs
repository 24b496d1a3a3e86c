//! Top-level wrapper around a runnable tree.
//!
//! A [`Command`] owns the origin [`Gate`] of a run. It exposes pause, resume
//! and stop to the caller and records every output line that steps send on
//! the command's output channel, forwarding each one to the caller as it
//! arrives.

mod logger;
mod report;

pub use report::{RunReport, RunState};

use crate::core::config::CommandConfig;
use crate::core::errors::{PhaseflowError, Result};
use crate::flow::RunAll;
use crate::gate::Gate;
use chrono::Utc;
use logger::OutputLogger;
use report::RunTiming;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct Command<R: RunAll> {
    runner: R,
    gate: Gate,
    logger: OutputLogger,
    config: CommandConfig,
    run_id: Uuid,
    timing: RwLock<RunTiming>,
}

impl<R: RunAll> Command<R> {
    /// Create a command with the default configuration.
    ///
    /// `output` is the receiving end of the channel the runner's steps write
    /// their output lines to.
    pub fn new(runner: R, output: mpsc::Receiver<String>) -> Self {
        Self::build(runner, output, CommandConfig::default())
    }

    pub fn with_config(
        runner: R,
        output: mpsc::Receiver<String>,
        config: CommandConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(runner, output, config))
    }

    fn build(runner: R, output: mpsc::Receiver<String>, config: CommandConfig) -> Self {
        let logger = OutputLogger::new(output, config.output_capacity, config.log_output);
        Self {
            runner,
            gate: Gate::new(),
            logger,
            config,
            run_id: Uuid::new_v4(),
            timing: RwLock::new(RunTiming::default()),
        }
    }

    /// Run the whole tree, forwarding output lines to `out`.
    ///
    /// Lines are recorded until the runner returns. Returns `true` if no
    /// failure was recorded.
    pub async fn run(&self, out: mpsc::Sender<String>) -> bool {
        let span = info_span!("command", name = %self.config.name, run_id = %self.run_id);
        async {
            self.timing.write().await.started_at = Some(Utc::now());
            info!("Command started");

            let (stop_tx, stop_rx) = oneshot::channel();
            let run = async {
                let gate = self.runner.run_all(self.gate.clone()).await;
                let _ = stop_tx.send(());
                gate
            };
            let (gate, ()) = tokio::join!(run, self.logger.listen(&out, stop_rx));

            let succeeded = !gate.has_failed().await;
            self.timing.write().await.finished_at = Some(Utc::now());
            if succeeded {
                info!("Command finished");
            } else {
                warn!("Command failed");
            }
            succeeded
        }
        .instrument(span)
        .await
    }

    /// Hold back new work. Returns whether the command was already paused.
    pub async fn pause(&self) -> Result<bool> {
        let was_paused = self.gate.pause().await?;
        info!(command = %self.config.name, "Command paused");
        Ok(was_paused)
    }

    /// Let held-back work continue. Returns whether the command was paused.
    pub async fn resume(&self) -> Result<bool> {
        let was_paused = self.gate.resume().await?;
        info!(command = %self.config.name, "Command resumed");
        Ok(was_paused)
    }

    /// Fail the run: steps already running finish, nothing new starts.
    pub async fn stop(&self) -> Result<()> {
        self.gate.fail().await?;
        info!(command = %self.config.name, "Command stopped");
        Ok(())
    }

    /// Lines recorded so far, in the order they arrived.
    pub async fn output(&self) -> Vec<String> {
        self.logger.lines().await
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// The step failure that ended the run, if any.
    ///
    /// `None` after a plain [`Command::stop`], which records no cause.
    pub async fn failure(&self) -> Option<Arc<PhaseflowError>> {
        self.gate.failure().await
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub async fn report(&self) -> RunReport {
        let timing = self.timing.read().await.clone();
        let state = if self.gate.has_failed().await {
            RunState::Failed
        } else if self.is_running() {
            if self.gate.is_paused().await {
                RunState::Paused
            } else {
                RunState::Running
            }
        } else if timing.finished_at.is_some() {
            RunState::Succeeded
        } else {
            RunState::NotStarted
        };

        RunReport {
            run_id: self.run_id.to_string(),
            name: self.config.name.clone(),
            state,
            failure: self.failure().await.map(|cause| cause.to_string()),
            output: self.output().await,
            started_at: timing.started_at,
            finished_at: timing.finished_at,
        }
    }
}
