// src/queue/mod.rs
//! In-process task queue.
//!
//! Jobs are typed values sent over an unbounded channel to one dispatcher
//! task. A semaphore bounds how many run at once; each admitted job executes
//! in its own spawned task under a [`RunGuard`]. Failures consult the
//! registered [`RetryPolicy`]: retries are future-scheduled re-submissions
//! (a spawned sleep plus re-send), never a blocked worker. The shutdown
//! signal stops admission and the cycle loop; jobs already running finish.

pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub use registry::{Backoff, Job, JobHandler, JobKind, Registry, RetryPolicy};

/// A job plus its attempt counter (0 on first submission).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub job: Job,
    pub attempt: u32,
}

/// Creates the queue's submission handle and the receiver the dispatcher
/// consumes. Handlers get clones of the handle so they can enqueue
/// follow-up work.
pub fn channel() -> (JobQueue, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobQueue { tx }, rx)
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl JobQueue {
    pub fn enqueue(&self, job: Job) {
        self.submit(Envelope { job, attempt: 0 });
    }

    /// Re-submits a job after `delay` without holding a worker. Used by the
    /// dispatcher's retry path and by interval re-arms.
    pub fn enqueue_after(&self, job: Job, attempt: u32, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // send failure means the dispatcher is gone; nothing to do
            let _ = tx.send(Envelope { job, attempt });
        });
    }

    fn submit(&self, envelope: Envelope) {
        let kind = envelope.job.kind();
        counter!("queue_enqueued_total", "kind" => kind.as_str()).increment(1);
        debug!(
            target: "queue",
            kind = kind.as_str(),
            priority = kind.priority(),
            attempt = envelope.attempt,
            "job enqueued"
        );
        if self.tx.send(envelope).is_err() {
            warn!(target: "queue", kind = kind.as_str(), "queue closed, job dropped");
        }
    }
}

/// Cooperative stop flag on a watch channel. Cloned freely; `trigger` flips
/// every clone.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has been triggered. A dropped sender counts
    /// as triggered.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped marker around one job execution: counts it in-flight on entry and
/// records duration on drop, whichever way the execution exits.
pub struct RunGuard {
    kind: JobKind,
    started: Instant,
}

impl RunGuard {
    pub fn enter(kind: JobKind) -> Self {
        gauge!("queue_inflight_jobs").increment(1.0);
        Self {
            kind,
            started: Instant::now(),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        gauge!("queue_inflight_jobs").decrement(1.0);
        histogram!("queue_job_duration_ms", "kind" => self.kind.as_str())
            .record(self.started.elapsed().as_millis() as f64);
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    queue: JobQueue,
    rx: mpsc::UnboundedReceiver<Envelope>,
    workers: Arc<Semaphore>,
    shutdown: ShutdownSignal,
}

impl Dispatcher {
    pub fn new(
        registry: Registry,
        queue: JobQueue,
        rx: mpsc::UnboundedReceiver<Envelope>,
        worker_count: usize,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            queue,
            rx,
            workers: Arc::new(Semaphore::new(worker_count.max(1))),
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let kind = envelope.job.kind();
            let Some(registration) = self.registry.lookup(kind) else {
                error!(target: "queue", kind = kind.as_str(), "no handler registered, job dropped");
                continue;
            };

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                acquired = self.workers.clone().acquire_owned() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let handler = Arc::clone(&registration.handler);
            let policy = registration.policy;
            let queue = self.queue.clone();
            tokio::spawn(async move {
                let guard = RunGuard::enter(kind);
                let outcome = handler.run(&envelope.job).await;
                match outcome {
                    Ok(()) => {
                        counter!("queue_completed_total", "kind" => kind.as_str()).increment(1);
                    }
                    Err(err) if envelope.attempt < policy.max_retries => {
                        let delay = policy.delay_after(envelope.attempt);
                        counter!("queue_retries_total", "kind" => kind.as_str()).increment(1);
                        warn!(
                            target: "queue",
                            kind = kind.as_str(),
                            attempt = envelope.attempt,
                            delay_secs = delay.as_secs(),
                            error = %err,
                            "job failed, retry scheduled"
                        );
                        queue.enqueue_after(envelope.job, envelope.attempt + 1, delay);
                    }
                    Err(err) => {
                        counter!("queue_abandoned_total", "kind" => kind.as_str()).increment(1);
                        error!(
                            target: "queue",
                            kind = kind.as_str(),
                            attempts = envelope.attempt + 1,
                            error = %err,
                            "job abandoned"
                        );
                    }
                }
                drop(guard);
                drop(permit);
            });
        }
        debug!(target: "queue", "dispatcher stopped");
    }
}
