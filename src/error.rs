//! Error types shared by the planner, the per-unit computations and the pools.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Planner or pool parameters that cannot describe any work
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A byte range that does not hold a whole number of u32 words
    #[error("chunk at offset {offset} has length {length}, not a multiple of {word_size}")]
    InvalidChunkAlignment {
        offset: usize,
        length: usize,
        word_size: usize,
    },

    /// A unit of work faulted (panic, crashed worker process, bad reply)
    #[error("worker failed on unit {unit}: {message}")]
    WorkerFailure { unit: usize, message: String },

    /// The pool could not be brought up with the requested size
    #[error("could not create pool of {workers} workers: {message}")]
    ResourceExhaustion { workers: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn worker_failure(unit: usize, message: impl Into<String>) -> Self {
        Self::WorkerFailure {
            unit,
            message: message.into(),
        }
    }

    pub fn resource_exhaustion(workers: usize, message: impl Into<String>) -> Self {
        Self::ResourceExhaustion {
            workers,
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
