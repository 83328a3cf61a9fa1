use tracing::debug;

use crate::error::{Error, Result};

/// Typical page size; also a multiple of the u32 word size.
pub const DEFAULT_GRANULARITY: usize = 4096;

/// A contiguous byte range `[offset, offset + length)` handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub offset: usize,
    pub length: usize,
}

impl ChunkDescriptor {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

/// Split `total_size` bytes into at most `worker_count` contiguous chunks.
///
/// Every chunk but the last is `ceil(ceil(total_size / granularity) / worker_count) * granularity`
/// bytes long; the last one takes whatever is left. When the input is small relative to the
/// worker count, fewer chunks than workers are emitted and the surplus workers stay idle.
pub fn plan(total_size: usize, worker_count: usize, granularity: usize) -> Result<Vec<ChunkDescriptor>> {
    if total_size == 0 {
        return Err(Error::invalid_argument("total size must be positive"));
    }
    if worker_count == 0 {
        return Err(Error::invalid_argument("worker count must be positive"));
    }
    if granularity == 0 {
        return Err(Error::invalid_argument("granularity must be positive"));
    }

    let units_total = total_size.div_ceil(granularity);
    let units_per_worker = units_total.div_ceil(worker_count);
    let chunk_size = units_per_worker
        .checked_mul(granularity)
        .ok_or_else(|| Error::invalid_argument("chunk size overflows usize"))?;

    let mut chunks = Vec::with_capacity(worker_count.min(units_total));
    for i in 0..worker_count {
        let offset = match i.checked_mul(chunk_size) {
            Some(offset) if offset < total_size => offset,
            _ => break,
        };
        let length = chunk_size.min(total_size - offset);
        chunks.push(ChunkDescriptor::new(offset, length));
    }

    debug!(
        total_size,
        worker_count,
        granularity,
        chunk_size,
        chunks = chunks.len(),
        "planned chunks"
    );

    Ok(chunks)
}
