use anyhow::Result;
use phaseflow::{first_just, mainly, sequence_of, Command, CommandConfig, Step};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// A step that pretends to work for `millis` and then reports `line`.
fn work(out: &mpsc::Sender<String>, line: &'static str, millis: u64) -> impl Step + 'static {
    let out = out.clone();
    move || {
        let out = out.clone();
        async move {
            sleep(Duration::from_millis(millis)).await;
            out.send(line.to_string()).await?;
            anyhow::Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (out, steps_rx) = mpsc::channel(32);

    // fetch, then build alongside lint and two test suites, then package
    let pipeline = sequence_of(mainly(work(&out, "fetched sources", 50)).named("fetch"))
        .then(
            mainly(work(&out, "compiled", 200))
                .named("build")
                .also_just(work(&out, "lint clean", 120))
                .also(
                    first_just(work(&out, "unit tests passed", 80))
                        .then_just(work(&out, "integration tests passed", 150)),
                ),
        )
        .then(mainly(work(&out, "packaged", 60)).named("package"))
        .end();

    let config = CommandConfig::from_yaml_str(include_str!("../command.yaml"))?;
    let command = Arc::new(Command::with_config(pipeline, steps_rx, config)?);

    // Pause while the build phase is in flight, then let it continue.
    let operator = {
        let command = command.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            if let Ok(false) = command.pause().await {
                info!("Paused by operator");
            }
            sleep(Duration::from_millis(500)).await;
            if let Ok(true) = command.resume().await {
                info!("Resumed by operator");
            }
        })
    };

    let (caller_tx, mut caller_rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(line) = caller_rx.recv().await {
            println!("> {}", line);
        }
    });

    let succeeded = command.run(caller_tx).await;
    operator.await?;
    printer.await?;

    println!("{}", command.report().await.to_json()?);
    if !succeeded {
        anyhow::bail!("pipeline failed");
    }
    Ok(())
}
