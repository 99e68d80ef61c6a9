//! Explicit executor for the per-series fan-out.
//!
//! Work is either run on the calling thread or on a dedicated rayon pool
//! owned by the executor. Nothing touches rayon's global pool.

use crate::error::{ForecastError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;

/// Runs independent tasks and collects their results in input order.
pub struct Executor {
    pool: Option<ThreadPool>,
}

impl Executor {
    /// Run every task on the calling thread.
    pub fn sequential() -> Self {
        Self { pool: None }
    }

    /// Run tasks on a private pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ForecastError::Config(
                "executor needs at least one thread".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fit-worker-{}", i))
            .build()
            .map_err(|e| ForecastError::Config(format!("cannot start thread pool: {}", e)))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Executor for an optional thread count; `None` is sequential.
    pub fn from_threads(threads: Option<usize>) -> Result<Self> {
        match threads {
            Some(n) => Self::with_threads(n),
            None => Ok(Self::sequential()),
        }
    }

    /// Number of worker threads (1 when sequential).
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, ThreadPool::current_num_threads)
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Apply `f` to every item. The output has the order of `items`.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(f).collect(),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::sequential()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("threads", &self.threads())
            .field("parallel", &self.is_parallel())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_map_preserves_order() {
        let executor = Executor::sequential();
        assert_eq!(executor.threads(), 1);
        assert_eq!(executor.map(&[1, 2, 3], |x| x * 10), vec![10, 20, 30]);
    }

    #[test]
    fn pooled_map_preserves_order() {
        let executor = Executor::with_threads(3).unwrap();
        assert_eq!(executor.threads(), 3);
        let items: Vec<usize> = (0..200).collect();
        let out = executor.map(&items, |x| x * x);
        assert_eq!(out, items.iter().map(|x| x * x).collect::<Vec<_>>());
    }

    #[test]
    fn pool_threads_are_named() {
        let executor = Executor::with_threads(2).unwrap();
        let names = executor.map(&[0, 1, 2, 3], |_| {
            std::thread::current().name().map(str::to_string)
        });
        assert!(names
            .iter()
            .all(|n| n.as_deref().is_some_and(|n| n.starts_with("fit-worker-"))));
    }

    #[test]
    fn zero_threads_is_a_config_error() {
        assert!(matches!(
            Executor::with_threads(0),
            Err(ForecastError::Config(_))
        ));
        assert!(!Executor::from_threads(None).unwrap().is_parallel());
    }
}
