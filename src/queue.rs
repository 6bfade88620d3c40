//! Bounded task pools shared by the discovery, store-resolution and crawl
//! stages of a run.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::Result;

/// Caps the number of remote calls in flight. Cloning shares the same permits,
/// so every queue built from one limit competes for the same K slots.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimit {
    permits: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed.
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("concurrency semaphore closed"))
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Submits follow-up jobs into the queue that is currently draining.
pub struct QueueHandle<J> {
    tx: mpsc::UnboundedSender<J>,
    outstanding: Arc<AtomicUsize>,
}

impl<J> Clone for QueueHandle<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            outstanding: Arc::clone(&self.outstanding),
        }
    }
}

impl<J> QueueHandle<J> {
    pub fn push(&self, job: J) {
        // Count before sending so the driver can never observe zero while a
        // follow-up is in the channel.
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// What a drained queue produced.
#[derive(Debug)]
pub struct Drained<R> {
    /// Successful results in completion order
    pub results: Vec<R>,
    pub failed: usize,
}

/// Self-resubmitting work queue. Jobs run on the tokio runtime, each holding a
/// permit from the shared [`ConcurrencyLimit`] while it works. The queue is
/// drained once no job is pending or in flight, including jobs pushed by
/// other jobs.
pub struct TaskQueue<J> {
    name: &'static str,
    limit: ConcurrencyLimit,
    handle: QueueHandle<J>,
    rx: mpsc::UnboundedReceiver<J>,
}

impl<J: Send + 'static> TaskQueue<J> {
    pub fn new(name: &'static str, limit: ConcurrencyLimit) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            limit,
            handle: QueueHandle {
                tx,
                outstanding: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        }
    }

    pub fn push(&self, job: J) {
        self.handle.push(job);
    }

    pub fn extend(&self, jobs: impl IntoIterator<Item = J>) {
        for job in jobs {
            self.push(job);
        }
    }

    /// Run `worker` over every job until the queue drains. A failing job is
    /// logged and counted; it never stops its siblings.
    pub async fn drain<R, F, Fut>(mut self, worker: F) -> Drained<R>
    where
        R: Send + 'static,
        F: Fn(J, QueueHandle<J>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let worker = Arc::new(worker);
        let mut tasks: JoinSet<Result<R>> = JoinSet::new();
        let mut drained = Drained {
            results: Vec::new(),
            failed: 0,
        };

        while self.handle.outstanding() > 0 {
            tokio::select! {
                Some(job) = self.rx.recv() => {
                    let limit = self.limit.clone();
                    let worker = Arc::clone(&worker);
                    let handle = self.handle.clone();
                    tasks.spawn(async move {
                        let _permit = limit.acquire().await;
                        worker(job, handle).await
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok(Ok(result)) => drained.results.push(result),
                        Ok(Err(e)) => {
                            warn!(queue = self.name, "Task failed: {e}");
                            drained.failed += 1;
                        }
                        Err(e) => {
                            error!(queue = self.name, "Task aborted: {e}");
                            drained.failed += 1;
                        }
                    }
                    self.handle.outstanding.fetch_sub(1, Ordering::SeqCst);
                    debug!(queue = self.name, outstanding = self.handle.outstanding(), "Task settled");
                }
            }
        }

        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::time::Duration;

    #[tokio::test]
    async fn drains_jobs_pushed_by_other_jobs() {
        let queue = TaskQueue::new("test", ConcurrencyLimit::new(2));
        queue.push(0u32);

        let drained = queue
            .drain(|n, handle| async move {
                if n < 5 {
                    handle.push(n + 1);
                }
                Ok(n)
            })
            .await;

        let mut seen = drained.results;
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(drained.failed, 0);
    }

    #[tokio::test]
    async fn failures_do_not_stop_siblings() {
        let queue = TaskQueue::new("test", ConcurrencyLimit::new(3));
        queue.extend(1..=5u32);

        let drained = queue
            .drain(|n, _| async move {
                if n % 2 == 0 {
                    Err(AppError::Parse(format!("job {n}")))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(drained.failed, 2);
        assert_eq!(drained.results.len(), 3);
    }

    #[tokio::test]
    async fn empty_queue_drains_immediately() {
        let queue: TaskQueue<u32> = TaskQueue::new("test", ConcurrencyLimit::new(1));
        let drained = queue.drain(|n, _| async move { Ok(n) }).await;
        assert!(drained.results.is_empty());
    }

    #[tokio::test]
    async fn never_exceeds_the_shared_limit() {
        let limit = ConcurrencyLimit::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let queue = TaskQueue::new("test", limit.clone());
        queue.extend(0..8u32);

        let (in_flight_w, peak_w) = (Arc::clone(&in_flight), Arc::clone(&peak));
        queue
            .drain(move |_, _| {
                let in_flight = Arc::clone(&in_flight_w);
                let peak = Arc::clone(&peak_w);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limit.available(), 2);
    }
}
