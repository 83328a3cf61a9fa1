use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::compute::factor_count;
use crate::error::{Error, Result};
use crate::process;

/// Where a unit of work runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Threads of a pool sharing the caller's address space
    Thread,
    /// Child processes running `program factor-worker`
    Process { program: PathBuf },
}

/// A fixed-size pool, built for one reduction and torn down when it returns.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    num_workers: usize,
    isolation: Isolation,
}

impl WorkerPool {
    pub fn new(num_workers: Option<usize>) -> Result<Self> {
        let num_workers = num_workers.unwrap_or_else(num_cpus::get);
        if num_workers == 0 {
            return Err(Error::invalid_argument("worker count must be positive"));
        }

        Ok(Self {
            num_workers,
            isolation: Isolation::Thread,
        })
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    /// Run `compute` over every unit on a freshly built thread pool.
    ///
    /// Results come back in the order of `units`. The first failing unit aborts the
    /// remaining ones and its error is returned; a panicking unit is reported as
    /// [`Error::WorkerFailure`].
    pub fn execute<U, R, F>(&self, units: &[U], compute: F) -> Result<Vec<R>>
    where
        U: Sync,
        R: Send,
        F: Fn(&U) -> Result<R> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .thread_name(|i| format!("parreduce-worker-{}", i))
            .build()
            .map_err(|e| Error::resource_exhaustion(self.num_workers, e.to_string()))?;

        debug!(workers = self.num_workers, units = units.len(), "dispatching to thread pool");

        pool.install(|| {
            units
                .par_iter()
                .enumerate()
                .map(|(index, unit)| {
                    panic::catch_unwind(AssertUnwindSafe(|| compute(unit))).unwrap_or_else(
                        |payload| Err(Error::worker_failure(index, panic_message(payload.as_ref()))),
                    )
                })
                .collect()
        })
    }

    /// Factor count of every number, in input order, under this pool's isolation.
    pub fn factor_counts(&self, numbers: &[u64]) -> Result<Vec<u64>> {
        info!(
            numbers = numbers.len(),
            workers = self.num_workers,
            isolation = ?self.isolation,
            "counting prime factors"
        );

        match &self.isolation {
            Isolation::Thread => self.execute(numbers, |&n| Ok(factor_count(n))),
            Isolation::Process { program } => {
                process::execute_factor_counts(numbers, self.num_workers, program)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(WorkerPool::new(Some(0)), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_defaults_to_cpu_count() {
        let pool = WorkerPool::new(None).unwrap();
        assert_eq!(pool.num_workers(), num_cpus::get());
        assert_eq!(pool.isolation(), &Isolation::Thread);
    }

    #[test]
    fn test_execute_preserves_submission_order() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let units: Vec<u64> = (0..1000).collect();
        let results = pool.execute(&units, |&u| Ok(u * 2)).unwrap();
        assert_eq!(results, units.iter().map(|u| u * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_execute_with_no_units() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        let results: Vec<u64> = pool.execute(&[] as &[u64], |&u| Ok(u)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_execute_propagates_unit_error() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        let units: Vec<usize> = (0..64).collect();
        let result = pool.execute(&units, |&u| {
            if u == 17 {
                Err(Error::InvalidChunkAlignment {
                    offset: u,
                    length: 3,
                    word_size: 4,
                })
            } else {
                Ok(u)
            }
        });
        assert!(matches!(result, Err(Error::InvalidChunkAlignment { offset: 17, .. })));
    }

    #[test]
    fn test_execute_reports_panic_as_worker_failure() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        let units = [1u64, 2, 3];
        let result = pool.execute(&units, |&u| {
            if u == 2 {
                panic!("bad unit");
            }
            Ok(u)
        });
        match result {
            Err(Error::WorkerFailure { unit, message }) => {
                assert_eq!(unit, 1);
                assert!(message.contains("bad unit"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_thread_factor_counts() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        let counts = pool.factor_counts(&[1, 2, 4, 17, 100]).unwrap();
        assert_eq!(counts, vec![0, 1, 2, 1, 4]);
    }
}
