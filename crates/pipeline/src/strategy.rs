//! Worker pool strategy
//!
//! Days are the unit of parallelism. Each run gets its own rayon pool sized
//! to the available cores, capped by the configured worker limit.

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Processing mode for the day loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl Default for ProcessingMode {
    fn default() -> Self {
        Self::for_cap(None)
    }
}

impl ProcessingMode {
    /// Available cores, bounded above by `max_workers`
    pub fn for_cap(max_workers: Option<usize>) -> Self {
        let cores = num_cpus();
        let workers = max_workers.map_or(cores, |cap| cap.min(cores)).max(1);
        if workers == 1 {
            ProcessingMode::Sequential
        } else {
            ProcessingMode::ParallelWith(workers)
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::ParallelWith(n) => *n,
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over items and collect results in input order
    fn par_map<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .thread_name(|i| format!("wxkrige-day-{i}"))
                    .build()
                    .map_err(|e| Error::ThreadPool(e.to_string()))?;
                Ok(pool.install(|| items.par_iter().map(f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
