// tests/queue_dispatch.rs
//
// Dispatcher behavior across registered job kinds: pool capacity and
// isolation between a failing kind and a healthy one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use feedrank::queue::{self, Dispatcher, Job, JobHandler, JobKind, Registry, RetryPolicy, ShutdownSignal};

struct CountingHandler {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn run(&self, _job: &Job) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct AlwaysFailing {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl JobHandler for AlwaysFailing {
    async fn run(&self, _job: &Job) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("wired to fail")
    }
}

/// Sleeps long enough that admissions overlap, tracking peak concurrency.
struct SlowHandler {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl JobHandler for SlowHandler {
    async fn run(&self, _job: &Job) -> Result<()> {
        let live = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..800 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(start_paused = true)]
async fn failing_kind_does_not_starve_healthy_kind() {
    let failing_runs = Arc::new(AtomicUsize::new(0));
    let healthy_runs = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::new();
    registry.register(
        JobKind::RecoveryScan,
        Arc::new(AlwaysFailing {
            runs: failing_runs.clone(),
        }),
        RetryPolicy::fixed(3, Duration::from_secs(30)),
    );
    registry.register(
        JobKind::RunCycle,
        Arc::new(CountingHandler {
            runs: healthy_runs.clone(),
        }),
        RetryPolicy::none(),
    );

    let (queue, rx) = queue::channel();
    let shutdown = ShutdownSignal::new();
    Dispatcher::new(registry, queue.clone(), rx, 2, shutdown.clone()).spawn();

    queue.enqueue(Job::RecoveryScan);
    queue.enqueue(Job::RunCycle);
    queue.enqueue(Job::RunCycle);

    let healthy = healthy_runs.clone();
    wait_until("healthy jobs to finish", move || {
        healthy.load(Ordering::SeqCst) == 2
    })
    .await;

    // the failing kind burns through its whole retry budget meanwhile
    let failing = failing_runs.clone();
    wait_until("failing job to exhaust retries", move || {
        failing.load(Ordering::SeqCst) == 4
    })
    .await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(failing_runs.load(Ordering::SeqCst), 4, "budget is 1 + 3 retries");
    assert_eq!(healthy_runs.load(Ordering::SeqCst), 2);
    shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn worker_pool_caps_concurrent_jobs() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::new();
    registry.register(
        JobKind::RunCycle,
        Arc::new(SlowHandler {
            current: current.clone(),
            peak: peak.clone(),
            runs: runs.clone(),
        }),
        RetryPolicy::none(),
    );

    let (queue, rx) = queue::channel();
    let shutdown = ShutdownSignal::new();
    Dispatcher::new(registry, queue.clone(), rx, 2, shutdown.clone()).spawn();

    for _ in 0..5 {
        queue.enqueue(Job::RunCycle);
    }

    let done = runs.clone();
    wait_until("all jobs to finish", move || done.load(Ordering::SeqCst) == 5).await;

    assert_eq!(peak.load(Ordering::SeqCst), 2, "two workers means two slots");
    assert_eq!(current.load(Ordering::SeqCst), 0);
    shutdown.trigger();
}
