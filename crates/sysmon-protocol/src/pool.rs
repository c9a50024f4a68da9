//! Bounded pool of worker threads for topic handlers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, warn};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors reported by [`WorkerPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every worker is busy and the queue is full.
    #[error("worker queue is full")]
    Saturated,
    /// The pool no longer accepts jobs.
    #[error("worker pool has shut down")]
    ShutDown,
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Fixed set of threads draining a bounded job queue.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Starts `threads` workers sharing a queue of `queue_depth` jobs.
    ///
    /// Both values are raised to at least one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] when a worker cannot be started; workers
    /// already started are stopped.
    pub fn new(threads: usize, queue_depth: usize) -> Result<Self, PoolError> {
        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_depth.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let pool = Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Vec::new()),
            in_flight,
        };

        for index in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let in_flight = Arc::clone(&pool.in_flight);
            let worker = thread::Builder::new()
                .name(format!("sysmon-worker-{index}"))
                .spawn(move || run_worker(&receiver, &in_flight))
                .map_err(PoolError::Spawn)?;
            pool.workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(worker);
        }
        debug!(target: POOL_TARGET, threads = threads.max(1), queue_depth = queue_depth.max(1), "worker pool started");
        Ok(pool)
    }

    /// Queues `job` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] when the queue is full and
    /// [`PoolError::ShutDown`] after [`WorkerPool::shutdown`].
    pub fn try_execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(PoolError::ShutDown);
        };
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Err(match error {
                    TrySendError::Full(_) => PoolError::Saturated,
                    TrySendError::Disconnected(_) => PoolError::ShutDown,
                })
            }
        }
    }

    /// Jobs accepted but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs, lets queued jobs finish, and joins the workers.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            if worker.join().is_err() {
                warn!(target: POOL_TARGET, "worker thread panicked");
            }
        }
        debug!(target: POOL_TARGET, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: &Mutex<Receiver<Job>>, in_flight: &AtomicUsize) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!(target: POOL_TARGET, "job panicked");
        }
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
