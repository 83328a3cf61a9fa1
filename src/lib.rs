//! Partitioned parallel reductions.
//!
//! Two workloads share one engine: a chunk planner splits the input, a [`WorkerPool`]
//! runs a pure per-unit computation over every piece, and [`reduce`] folds the partial
//! results. Each parallel entry point has a sequential counterpart that must agree with it.

pub mod compute;
pub mod error;
pub mod io;
pub mod parallel;
pub mod plan;
pub mod process;
pub mod reduce;

use std::io::{ErrorKind, Read};

use tracing::info;

pub use crate::error::{Error, Result};
pub use crate::parallel::{Isolation, WorkerPool};
pub use crate::plan::{plan, ChunkDescriptor, DEFAULT_GRANULARITY};
pub use crate::reduce::reduce;

use crate::compute::{factor_count, sum_be_u32, WORD_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumOptions {
    /// Alignment unit of every chunk but the last; must be a multiple of 4
    pub granularity: usize,
}

impl Default for SumOptions {
    fn default() -> Self {
        Self {
            granularity: DEFAULT_GRANULARITY,
        }
    }
}

/// Sum the big-endian u32 values in `data` across `worker_count` threads.
pub fn parallel_sum(data: &[u8], worker_count: usize) -> Result<u64> {
    parallel_sum_with(data, worker_count, &SumOptions::default())
}

pub fn parallel_sum_with(data: &[u8], worker_count: usize, options: &SumOptions) -> Result<u64> {
    if worker_count == 0 {
        return Err(Error::invalid_argument("worker count must be positive"));
    }
    if data.is_empty() {
        return Ok(0);
    }

    let chunks = plan(data.len(), worker_count, options.granularity)?;
    info!(bytes = data.len(), chunks = chunks.len(), workers = worker_count, "parallel sum");

    let pool = WorkerPool::new(Some(worker_count))?;
    let partials = pool.execute(&chunks, |chunk| sum_be_u32(&data[chunk.range()], chunk.offset))?;

    Ok(reduce(partials))
}

/// Single-threaded reference for [`parallel_sum`].
pub fn sequential_sum(data: &[u8]) -> Result<u64> {
    sum_be_u32(data, 0)
}

/// Single-threaded reference that streams words from `reader` instead of mapping them.
pub fn sequential_sum_reader<R: Read>(mut reader: R) -> Result<u64> {
    let mut total = 0u64;
    let mut offset = 0usize;
    let mut word = [0u8; WORD_SIZE];

    loop {
        let mut filled = 0;
        while filled < WORD_SIZE {
            match reader.read(&mut word[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => return Ok(total),
            WORD_SIZE => {
                total = total.wrapping_add(u32::from_be_bytes(word) as u64);
                offset += WORD_SIZE;
            }
            _ => {
                return Err(Error::InvalidChunkAlignment {
                    offset: 0,
                    length: offset + filled,
                    word_size: WORD_SIZE,
                })
            }
        }
    }
}

/// Total prime-factor count of `numbers` on a thread pool of `worker_count` workers.
pub fn parallel_factor_count(numbers: &[u64], worker_count: usize) -> Result<u64> {
    parallel_factor_count_with(numbers, &WorkerPool::new(Some(worker_count))?)
}

/// Total prime-factor count of `numbers` under the pool's isolation strategy.
pub fn parallel_factor_count_with(numbers: &[u64], pool: &WorkerPool) -> Result<u64> {
    Ok(reduce(pool.factor_counts(numbers)?))
}

/// Single-threaded reference for [`parallel_factor_count`], consuming numbers lazily.
pub fn sequential_factor_count<I>(numbers: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<u64>>,
{
    numbers
        .into_iter()
        .try_fold(0u64, |total, n| -> Result<u64> {
            Ok(total.wrapping_add(factor_count(n?)))
        })
}
