use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;

/// The body of a phase.
///
/// Any `Fn() -> impl Future<Output = anyhow::Result<()>>` closure is a step,
/// so most callers never implement this by hand.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Step for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self) -> Result<()> {
        (self)().await
    }
}
