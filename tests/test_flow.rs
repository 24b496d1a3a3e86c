//! Integration tests for phase/sequence execution
//!
//! Trees are built with the fluent builder, every step records its name, and
//! the tests check which steps ran and in what relative order.

use anyhow::anyhow;
use phaseflow::{first_just, mainly, sequence_of, Gate, Phase, Sequence, Step};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const LONG: Duration = Duration::from_secs(10);

/// Route library logs through the test harness; repeated calls are no-ops
fn init_tracing() {
    let _ = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn ok(&self, name: &'static str) -> impl Step + 'static {
        let log = self.0.clone();
        move || {
            let log = log.clone();
            async move {
                sleep(Duration::from_millis(fastrand::u64(1..15))).await;
                log.lock().unwrap().push(name.to_string());
                anyhow::Ok(())
            }
        }
    }

    fn fail(&self, name: &'static str) -> impl Step + 'static {
        let log = self.0.clone();
        move || {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name.to_string());
                Err::<(), _>(anyhow!("{} failed", name))
            }
        }
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn ran(&self) -> HashSet<String> {
        self.entries().into_iter().collect()
    }

    fn position(&self, name: &str) -> usize {
        self.entries()
            .iter()
            .position(|entry| entry == name)
            .unwrap_or_else(|| panic!("{} never ran", name))
    }
}

fn names(list: &[&str]) -> HashSet<String> {
    list.iter().map(|name| name.to_string()).collect()
}

async fn wait_quiet(gate: &Gate) {
    // Children of a failed phase are detached; give them time to settle.
    timeout(LONG, async {
        while gate.pending() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nested_tree_runs_every_step() {
    init_tracing();
    let rec = Recorder::default();
    let seq = sequence_of(
        mainly(rec.ok("A"))
            .also(sequence_of(mainly(rec.ok("A1")).also(
                first_just(rec.ok("A1a")).then_just(rec.ok("A1b")),
            )))
            .also_just(rec.ok("A2")),
    )
    .then(mainly(rec.ok("B")).also_just(rec.ok("B1")).also_just(rec.ok("B2")))
    .end();

    let gate = timeout(LONG, seq.run_all(Gate::new())).await.unwrap();
    assert!(!gate.has_failed().await);
    assert_eq!(
        rec.ran(),
        names(&["A", "A1", "A1a", "A1b", "A2", "B", "B1", "B2"])
    );
    assert_eq!(rec.entries().len(), 8);

    // The whole first phase finishes before the second one starts.
    let first_phase = ["A", "A1", "A1a", "A1b", "A2"];
    let second_phase = ["B", "B1", "B2"];
    let last_of_first = first_phase.iter().map(|n| rec.position(n)).max().unwrap();
    let first_of_second = second_phase.iter().map(|n| rec.position(n)).min().unwrap();
    assert!(last_of_first < first_of_second);

    assert!(rec.position("A1a") < rec.position("A1b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_in_child_stops_later_phases() {
    init_tracing();
    let rec = Recorder::default();
    let seq = sequence_of(
        mainly(rec.ok("A"))
            .also(sequence_of(mainly(rec.fail("A1")).also(
                first_just(rec.ok("A1a")).then_just(rec.ok("A1b")),
            )))
            .also_just(rec.ok("A2")),
    )
    .then(mainly(rec.ok("B")).also_just(rec.ok("B1")).also_just(rec.ok("B2")))
    .end();

    let gate = timeout(LONG, seq.run_all(Gate::new())).await.unwrap();
    assert!(gate.has_failed().await);
    wait_quiet(&gate).await;

    let ran = rec.ran();
    assert!(ran.contains("A"));
    assert!(ran.contains("A1"));
    assert!(ran.is_disjoint(&names(&["B", "B1", "B2"])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_deep_in_child_sequence() {
    init_tracing();
    let rec = Recorder::default();
    let seq = mainly(rec.ok("A"))
        .also(first_just(rec.ok("A1")).then_just(rec.ok("A1b")))
        .also(
            first_just(rec.ok("A2a"))
                .then_just(rec.ok("A2b"))
                .then_just(rec.fail("A2c"))
                .then_just(rec.ok("A2d")),
        )
        .end();

    let gate = timeout(LONG, seq.run_all(Gate::new())).await.unwrap();
    assert!(gate.has_failed().await);
    wait_quiet(&gate).await;

    let ran = rec.ran();
    assert!(ran.is_superset(&names(&["A", "A2a", "A2b", "A2c"])));
    assert!(!ran.contains("A2d"));
    assert!(rec.position("A2a") < rec.position("A2b"));
}

#[tokio::test]
async fn test_single_step_runs_exactly_once() {
    let rec = Recorder::default();
    let seq = Sequence::new(vec![Phase::new(rec.ok("A"))]);

    let gate = seq.run_all(Gate::new()).await;
    assert!(!gate.has_failed().await);
    assert_eq!(rec.entries(), vec!["A"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_body_with_child_terminates() {
    let rec = Recorder::default();
    let seq = mainly(rec.fail("A")).also_just(rec.ok("B")).end();

    let gate = timeout(LONG, seq.run_all(Gate::new())).await.unwrap();
    assert!(gate.has_failed().await);
    assert!(rec.ran().contains("A"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_fan_out() {
    const WIDTH: u32 = 100;
    let finished = Arc::new(AtomicU32::new(0));

    let mut phase = mainly(|| async { anyhow::Ok(()) });
    for _ in 0..WIDTH {
        let finished = finished.clone();
        phase = phase.also_just(move || {
            let finished = finished.clone();
            async move {
                sleep(Duration::from_millis(fastrand::u64(5..50))).await;
                finished.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });
    }
    let seq = sequence_of(phase).then_just(|| async { anyhow::Ok(()) }).end();

    let gate = timeout(LONG, seq.run_all(Gate::new())).await.unwrap();
    assert!(!gate.has_failed().await);
    assert_eq!(finished.load(Ordering::SeqCst), WIDTH);
    assert_eq!(gate.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pause_holds_next_phase_until_resume() {
    init_tracing();
    let rec = Recorder::default();
    let seq = first_just(rec.ok("one"))
        .then_just(|| async {
            sleep(Duration::from_millis(100)).await;
            anyhow::Ok(())
        })
        .then_just(rec.ok("two"))
        .end();

    let gate = Gate::new();
    let run = {
        let seq = seq.clone();
        let gate = gate.clone();
        tokio::spawn(async move { seq.run_all(gate).await })
    };

    sleep(Duration::from_millis(50)).await;
    assert!(!gate.pause().await.unwrap());

    sleep(Duration::from_millis(300)).await;
    assert_eq!(rec.entries(), vec!["one"]);
    assert!(seq.is_running());

    assert!(gate.resume().await.unwrap());
    let gate = timeout(LONG, run).await.unwrap().unwrap();
    assert!(!gate.has_failed().await);
    assert_eq!(rec.entries(), vec!["one", "two"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_external_failure_stops_run() {
    init_tracing();
    let rec = Recorder::default();
    let seq = first_just(|| async {
        sleep(Duration::from_millis(200)).await;
        anyhow::Ok(())
    })
    .then_just(rec.ok("never"))
    .end();

    let gate = Gate::new();
    let run = {
        let gate = gate.clone();
        tokio::spawn(async move { seq.run_all(gate).await })
    };
    sleep(Duration::from_millis(50)).await;
    gate.fail().await.unwrap();

    let gate = timeout(LONG, run).await.unwrap().unwrap();
    assert!(gate.has_failed().await);
    assert!(gate.failure().await.is_none());
    assert!(rec.entries().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_paused_run_can_still_be_failed() {
    let rec = Recorder::default();
    let seq = first_just(rec.ok("first")).then_just(rec.ok("second")).end();

    let gate = Gate::new();
    gate.pause().await.unwrap();
    let run = {
        let gate = gate.clone();
        tokio::spawn(async move { seq.run_all(gate).await })
    };
    sleep(Duration::from_millis(50)).await;
    gate.fail().await.unwrap();

    let gate = timeout(LONG, run).await.unwrap().unwrap();
    assert!(gate.has_failed().await);
    assert!(rec.entries().is_empty());
}
