//! Bounded worker pool for blocking work
//!
//! Handlers never run blocking code on the event loop. They hand it to the
//! [`BlockingExecutor`], which runs it on one of `N` worker threads pulling
//! from a shared FIFO channel, and await the returned [`BlockingHandle`]. The
//! handle resolves wherever it is polled, so the handler resumes on the event
//! loop, not on the worker.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::BlockingConfig;
use crate::error::{BlockingOperationError, BoxError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Snapshot of executor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockingStats {
    pub workers: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    running: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Fixed-size pool of worker threads.
pub struct BlockingExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    size: usize,
}

impl BlockingExecutor {
    /// Spawn the worker threads.
    pub fn new(config: BlockingConfig) -> std::io::Result<Self> {
        let size = config.workers.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || worker_loop(index, receiver))?;
            workers.push(handle);
        }

        info!(workers = size, "BlockingExecutor: started {} workers", size);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
            size,
        })
    }

    /// Queue `operation` and return a future for its result.
    ///
    /// Never blocks the caller. Errors returned by the operation resolve the
    /// handle to [`BlockingOperationError::Failed`]; panics to
    /// [`BlockingOperationError::Panicked`].
    pub fn submit<F, T, E>(&self, operation: F) -> BlockingHandle<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        let (tx, rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);

        let job: Job = Box::new(move || {
            counters.queued.fetch_sub(1, Ordering::Relaxed);
            counters.running.fetch_add(1, Ordering::Relaxed);

            let outcome = match catch_unwind(AssertUnwindSafe(operation)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(BlockingOperationError::Failed(e.into())),
                Err(panic) => Err(BlockingOperationError::Panicked(panic_message(panic.as_ref()))),
            };

            counters.running.fetch_sub(1, Ordering::Relaxed);
            counters.completed.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = &outcome {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "BlockingExecutor: operation failed");
            }

            if tx.send(outcome).is_err() {
                debug!("BlockingExecutor: caller went away, result discarded");
            }
        });

        let sent = match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(sender) => {
                    self.counters.queued.fetch_add(1, Ordering::Relaxed);
                    let accepted = sender.send(job).is_ok();
                    if !accepted {
                        self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                    }
                    accepted
                }
                None => false,
            },
            Err(_) => false,
        };

        if sent {
            BlockingHandle::pending(rx)
        } else {
            BlockingHandle::failed(BlockingOperationError::Shutdown)
        }
    }

    /// Queue an operation that cannot fail.
    pub fn run<F, T>(&self, operation: F) -> BlockingHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move || Ok::<T, BoxError>(operation()))
    }

    pub fn workers(&self) -> usize {
        self.size
    }

    pub fn stats(&self) -> BlockingStats {
        BlockingStats {
            workers: self.size,
            queued: self.counters.queued.load(Ordering::Relaxed),
            running: self.counters.running.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Whether new work is still accepted.
    pub fn is_running(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Stop accepting work, let queued operations finish and join the workers.
    ///
    /// Joining happens on tokio's blocking pool so the event loop keeps
    /// running while operations drain.
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let pending = self.counters.queued.load(Ordering::Relaxed)
            + self.counters.running.load(Ordering::Relaxed);
        info!(pending = pending, "BlockingExecutor: draining before shutdown");

        let joined = tokio::task::spawn_blocking(move || {
            for worker in workers {
                if worker.join().is_err() {
                    error!("BlockingExecutor: worker thread panicked");
                }
            }
        })
        .await;

        if let Err(e) = joined {
            error!(error = %e, "BlockingExecutor: failed to join workers");
        }
        info!("BlockingExecutor: stopped");
    }
}

impl Drop for BlockingExecutor {
    fn drop(&mut self) {
        // Closing the queue lets idle workers exit; they are detached here.
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

fn worker_loop(index: usize, receiver: Receiver<Job>) {
    debug!(worker = index, "BlockingExecutor: worker started");
    // Ends once the sender is dropped and the channel is drained.
    for job in receiver.iter() {
        job();
    }
    debug!(worker = index, "BlockingExecutor: worker exiting");
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Future resolving to the result of a submitted operation.
#[must_use = "blocking results are discarded unless the handle is awaited"]
pub struct BlockingHandle<T> {
    state: HandleState<T>,
}

enum HandleState<T> {
    Pending(oneshot::Receiver<Result<T, BlockingOperationError>>),
    Failed(Option<BlockingOperationError>),
}

impl<T> BlockingHandle<T> {
    fn pending(rx: oneshot::Receiver<Result<T, BlockingOperationError>>) -> Self {
        Self {
            state: HandleState::Pending(rx),
        }
    }

    fn failed(error: BlockingOperationError) -> Self {
        Self {
            state: HandleState::Failed(Some(error)),
        }
    }
}

impl<T> Unpin for BlockingHandle<T> {}

impl<T> Future for BlockingHandle<T> {
    type Output = Result<T, BlockingOperationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                // The job was dropped without running, which only happens
                // when the queue is torn down.
                Poll::Ready(Err(_)) => Poll::Ready(Err(BlockingOperationError::Shutdown)),
                Poll::Pending => Poll::Pending,
            },
            HandleState::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or(BlockingOperationError::Shutdown))),
        }
    }
}
