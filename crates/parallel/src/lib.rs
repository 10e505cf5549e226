//! Declarative parallel/sequential execution utilities.
//!
//! The `cfg(feature = "parallel")` logic lives here in one place so call
//! sites stay free of feature gates:
//! - [`map_slice`]: order-preserving map over a slice (rayon `par_iter` or `iter`)
//! - [`WorkerPool`]: a bounded set of worker threads that runs detached jobs
//!
//! # Runtime Override
//!
//! Everything accepts a `force_sequential` flag. When `true`, work runs on the
//! calling thread even if the `parallel` feature is enabled, which keeps a
//! sequential baseline available for profiling and deterministic debugging.
//!
//! # Example
//!
//! ```ignore
//! let pool = parallel::WorkerPool::new(4, false)?;
//! let (tx, rx) = crossbeam_channel::unbounded();
//! for i in 0..16 {
//!     let tx = tx.clone();
//!     pool.spawn(move || { let _ = tx.send(i * i); });
//! }
//! drop(tx);
//! let total: u64 = rx.iter().sum();
//! ```

#[cfg(feature = "parallel")]
use std::panic::{self, AssertUnwindSafe};
#[cfg(feature = "parallel")]
use std::sync::Arc;
#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "parallel")]
use std::thread;

#[cfg(feature = "parallel")]
use crossbeam_channel::{Receiver, Sender};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use thiserror::Error;

// =============================================================================
// Slice Operations
// =============================================================================

/// Map a function over a slice, potentially in parallel.
///
/// Returns results in input order either way.
#[inline]
pub fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}

// =============================================================================
// Worker Pool
// =============================================================================

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(feature = "parallel")]
type Job = Box<dyn FnOnce() + Send + 'static>;

#[cfg(feature = "parallel")]
struct Threads {
    jobs: Sender<Job>,
    queue: Receiver<Job>,
    /// Workers still to retire after their current job.
    surplus: Arc<AtomicUsize>,
    spawned: AtomicUsize,
}

#[cfg(feature = "parallel")]
impl Threads {
    fn start(workers: usize) -> Result<Self, PoolError> {
        let (jobs, queue) = crossbeam_channel::unbounded();
        let threads = Self {
            jobs,
            queue,
            surplus: Arc::new(AtomicUsize::new(0)),
            spawned: AtomicUsize::new(0),
        };
        for _ in 0..workers {
            threads.spawn_worker()?;
        }
        Ok(threads)
    }

    fn spawn_worker(&self) -> Result<(), PoolError> {
        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        let queue = self.queue.clone();
        let surplus = Arc::clone(&self.surplus);
        thread::Builder::new()
            .name(format!("trial-worker-{index}"))
            .spawn(move || worker_loop(&queue, &surplus))?;
        Ok(())
    }
}

/// Pull jobs until the pool is dropped or this worker is retired.
#[cfg(feature = "parallel")]
fn worker_loop(queue: &Receiver<Job>, surplus: &AtomicUsize) {
    while let Ok(job) = queue.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!("worker job panicked");
        }
        if surplus
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            break;
        }
    }
}

/// Bounded set of worker threads for detached jobs.
///
/// At most `workers` jobs run at once; the rest queue inside the pool. A job
/// the caller stops waiting for can hand its slot back with
/// [`WorkerPool::replace_worker`]. In sequential mode (feature off, or
/// `force_sequential`) [`WorkerPool::spawn`] runs the job to completion
/// before returning.
///
/// Dropping the pool lets idle workers exit once the queue drains; it never
/// joins them.
pub struct WorkerPool {
    workers: usize,
    #[cfg(feature = "parallel")]
    threads: Option<Threads>,
}

impl WorkerPool {
    pub fn new(workers: usize, force_sequential: bool) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        #[cfg(feature = "parallel")]
        {
            let threads = if force_sequential {
                None
            } else {
                Some(Threads::start(workers)?)
            };
            tracing::debug!(workers, sequential = threads.is_none(), "worker pool ready");
            Ok(Self { workers, threads })
        }

        #[cfg(not(feature = "parallel"))]
        {
            let _ = force_sequential;
            tracing::debug!(workers, sequential = true, "worker pool ready");
            Ok(Self { workers })
        }
    }

    /// Configured concurrency bound.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Whether jobs run inline on the caller's thread.
    pub fn is_sequential(&self) -> bool {
        #[cfg(feature = "parallel")]
        {
            self.threads.is_none()
        }

        #[cfg(not(feature = "parallel"))]
        {
            true
        }
    }

    /// Submit a job.
    ///
    /// Completion is observed through whatever channel the job reports on;
    /// the pool itself returns nothing.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        #[cfg(feature = "parallel")]
        {
            match &self.threads {
                // The pool keeps its own receiver, so the queue is never
                // disconnected while `self` is alive.
                Some(threads) => {
                    let _ = threads.jobs.send(Box::new(job));
                }
                None => job(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            job();
        }
    }

    /// Give back the slot of a job that is no longer waited for.
    ///
    /// Starts one extra worker so queued jobs keep running at full width.
    /// The next worker to finish a job retires, which restores the bound
    /// once the abandoned job returns. No-op in sequential mode.
    pub fn replace_worker(&self) -> Result<(), PoolError> {
        #[cfg(feature = "parallel")]
        {
            if let Some(threads) = &self.threads {
                threads.spawn_worker()?;
                threads.surplus.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("sequential", &self.is_sequential())
            .finish()
    }
}
