use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::debug;

/// Records output lines produced by steps and forwards them to a caller.
#[derive(Debug)]
pub(crate) struct OutputLogger {
    input: Mutex<mpsc::Receiver<String>>,
    lines: RwLock<Vec<String>>,
    log_output: bool,
}

impl OutputLogger {
    pub(crate) fn new(input: mpsc::Receiver<String>, capacity: usize, log_output: bool) -> Self {
        Self {
            input: Mutex::new(input),
            lines: RwLock::new(Vec::with_capacity(capacity)),
            log_output,
        }
    }

    /// Record and forward lines until `stop` fires, then take whatever is
    /// already buffered and return.
    ///
    /// `out` must be drained concurrently (or have room for every line),
    /// otherwise forwarding blocks the steps that produce output.
    pub(crate) async fn listen(&self, out: &mpsc::Sender<String>, mut stop: oneshot::Receiver<()>) {
        let mut input = self.input.lock().await;
        loop {
            tokio::select! {
                biased;
                line = input.recv() => match line {
                    Some(line) => self.record(line, out).await,
                    None => {
                        debug!("Output channel closed");
                        break;
                    }
                },
                _ = &mut stop => {
                    while let Ok(line) = input.try_recv() {
                        self.record(line, out).await;
                    }
                    break;
                }
            }
        }
    }

    async fn record(&self, line: String, out: &mpsc::Sender<String>) {
        if self.log_output {
            debug!(line = %line, "Step output");
        }
        self.lines.write().await.push(line.clone());
        if out.send(line).await.is_err() {
            debug!("Output receiver dropped, line recorded only");
        }
    }

    pub(crate) async fn lines(&self) -> Vec<String> {
        self.lines.read().await.clone()
    }
}
