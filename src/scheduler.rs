//! Rate-limited execution of recurring jobs.
//!
//! [`RateLimiter`] admits at most [`Rate::queries`] job starts within any
//! window of [`Rate::per`], across all submitted jobs. Jobs wait in a single
//! FIFO queue; a job returning [`Next::Requeue`] goes back to the tail of it,
//! which makes admission round-robin across recurring jobs.
//!
//! A job value is owned either by the queue or by its single running
//! execution, so runs of the same job never overlap.

use std::{collections::VecDeque, panic::AssertUnwindSafe, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info};

use crate::error::SchedulerError;

/// What happens to a job after it ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Next {
    /// Submit the same job again.
    Requeue,

    /// Drop the job.
    Done,
}

/// Unit of work executed by the [`RateLimiter`].
#[async_trait]
pub trait Job: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> String;

    async fn run(&mut self) -> Next;
}

/// Admission budget: `queries` job starts per `per`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
    queries: usize,
    per: Duration,
}

impl Rate {
    pub fn new(queries: usize, per: Duration) -> Result<Self, SchedulerError> {
        if queries == 0 {
            return Err(SchedulerError::InvalidRate(
                "at least one query per window required".to_string(),
            ));
        }
        Ok(Self { queries, per })
    }

    pub fn queries(&self) -> usize {
        self.queries
    }

    pub fn per(&self) -> Duration {
        self.per
    }
}

type BoxedJob = Box<dyn Job>;

/// Shared admission-controlled job queue.
///
/// Dropping the limiter raises its stop signal; use [`Self::shutdown`] to
/// additionally wait for running jobs.
#[derive(Debug)]
pub struct RateLimiter {
    rate: Rate,
    tx: mpsc::UnboundedSender<BoxedJob>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

struct Dispatcher {
    rate: Rate,
    rx: mpsc::UnboundedReceiver<BoxedJob>,
    tx: mpsc::UnboundedSender<BoxedJob>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    starts: VecDeque<Instant>,
}

impl RateLimiter {
    /// Starts the dispatcher on the current tokio runtime.
    pub fn start(rate: Rate) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let dispatcher = Dispatcher {
            rate,
            rx,
            tx: tx.clone(),
            cancel: cancel.clone(),
            tracker: tracker.clone(),
            starts: VecDeque::with_capacity(rate.queries),
        };
        tracker.spawn(dispatcher.run());
        info!(queries = rate.queries, per = ?rate.per, "Rate limiter started");

        Self {
            rate,
            tx,
            cancel,
            tracker,
        }
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Enqueues the job without waiting for admission.
    pub fn submit(&self, job: BoxedJob) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        self.tx.send(job).map_err(|_| SchedulerError::Stopped)
    }

    /// Stop signal of the limiter, raised by [`Self::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops admitting jobs and waits for the running ones to complete.
    /// Queued jobs are dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            let job = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            if !self.admit().await {
                break;
            }
            debug!(job = %job.name(), "Job admitted");
            self.tracker
                .spawn(execute(job, self.tx.clone(), self.cancel.clone()));
        }

        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        info!(dropped, "Rate limiter stopped");
    }

    /// Waits until one more start fits into the window ending now and
    /// records it. Returns `false` if stopped while waiting.
    ///
    /// A window reaching past the clock's range never frees up.
    async fn admit(&mut self) -> bool {
        if self.starts.len() >= self.rate.queries {
            if let Some(oldest) = self.starts.pop_front() {
                let Some(deadline) = oldest.checked_add(self.rate.per) else {
                    debug!(per = ?self.rate.per, "Window out of clock range, admission closed");
                    self.cancel.cancelled().await;
                    return false;
                };
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return false,
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
        }
        self.starts.push_back(Instant::now());
        true
    }
}

async fn execute(
    mut job: BoxedJob,
    tx: mpsc::UnboundedSender<BoxedJob>,
    cancel: CancellationToken,
) {
    let next = match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(next) => next,
        Err(_) => {
            error!(job = %job.name(), "Job panicked");
            Next::Requeue
        }
    };
    match next {
        Next::Requeue if !cancel.is_cancelled() => {
            if let Err(mpsc::error::SendError(job)) = tx.send(job) {
                debug!(job = %job.name(), "Queue closed, job dropped");
            }
        }
        Next::Requeue => debug!(job = %job.name(), "Rate limiter stopped, job dropped"),
        Next::Done => debug!(job = %job.name(), "Job done"),
    }
}
