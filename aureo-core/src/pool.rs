//! Bounded worker pool for batch embed/detect work.
//!
//! Jobs go through a bounded queue; a full queue rejects new work instead of
//! buffering it. Each job gets a [`CancelToken`] that the caller's timeout
//! trips, and long pixel scans poll it between rows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use thiserror::Error;

/// Cooperative cancellation flag shared between a caller and a job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker queue is full ({capacity} pending jobs)")]
    QueueFull { capacity: usize },

    #[error("Job timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Worker pool is shut down")]
    Closed,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            workers,
            queue_capacity: workers * 4,
        }
    }
}

/// Fixed set of threads draining a bounded job queue.
#[derive(Debug)]
pub struct SealPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl SealPool {
    pub fn new(config: PoolConfig) -> Self {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = bounded::<Job>(capacity);

        let handles = (0..workers)
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("aureo-worker-{}", index))
                    .spawn(move || worker_loop(receiver))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to spawn seal worker");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(workers = handles.len(), queue_capacity = capacity, "Seal pool started");

        Self {
            sender: Some(sender),
            workers: handles,
            capacity,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Queue `task`, handing it a fresh cancellation token.
    ///
    /// Never blocks: a full queue yields `PoolError::QueueFull`.
    pub fn submit<T, F>(&self, task: F) -> Result<JobHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        let token = CancelToken::new();
        let (result_tx, result_rx) = bounded(1);

        let job_token = token.clone();
        let job: Job = Box::new(move || {
            if job_token.is_cancelled() {
                return;
            }
            // The receiver may be gone if the caller already timed out.
            let _ = result_tx.send(task(&job_token));
        });

        match sender.try_send(job) {
            Ok(()) => Ok(JobHandle {
                result: result_rx,
                token,
            }),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity, "Seal pool queue full, rejecting job");
                Err(PoolError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Closed),
        }
    }
}

impl Drop for SealPool {
    fn drop(&mut self) {
        // Closing the queue lets every worker fall out of its loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Seal worker panicked");
            }
        }
    }
}

fn worker_loop(jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        job();
    }
}

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    result: Receiver<T>,
    token: CancelToken,
}

impl<T> JobHandle<T> {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Block until the job finishes or `timeout` expires.
    ///
    /// On expiry the job's token is cancelled so the worker can abandon it.
    pub fn wait(self, timeout: Duration) -> Result<T, PoolError> {
        match self.result.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                self.token.cancel();
                Err(PoolError::TimedOut(timeout))
            }
            // A cancelled or panicked job drops its sender without a value.
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn pool(workers: usize, queue_capacity: usize) -> SealPool {
        SealPool::new(PoolConfig {
            workers,
            queue_capacity,
        })
    }

    #[test]
    fn test_runs_jobs() {
        let pool = pool(2, 4);
        let handle = pool.submit(|_| 21 * 2).unwrap();
        assert_eq!(handle.wait(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_rejects_when_queue_is_full() {
        let pool = pool(1, 1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        // Occupy the single worker until released.
        let busy = pool
            .submit(move |_| {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let queued = pool.submit(|_| ()).unwrap();
        let rejected = pool.submit(|_| ());
        assert_eq!(rejected.unwrap_err(), PoolError::QueueFull { capacity: 1 });

        release_tx.send(()).unwrap();
        busy.wait(Duration::from_secs(5)).unwrap();
        queued.wait(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_timeout_cancels_token() {
        let pool = pool(1, 1);
        let handle = pool
            .submit(|token| {
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                "abandoned"
            })
            .unwrap();
        let token = handle.token().clone();

        let err = handle.wait(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, PoolError::TimedOut(Duration::from_millis(20)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_default_config_uses_available_cores() {
        let config = PoolConfig::default();
        assert!(config.workers >= 1);
        assert!(config.queue_capacity >= config.workers);
    }
}
