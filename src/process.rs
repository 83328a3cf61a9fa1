//! Process-isolated factor counting.
//!
//! The parent spawns `program factor-worker` once per worker and talks to each child over a
//! line protocol: one decimal integer written to its stdin, one decimal factor count read
//! back from its stdout. Worker threads in the parent claim the next unclaimed item from a
//! shared atomic cursor, so the children behave as a pool pulling from one queue.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, warn};

use crate::compute::factor_count;
use crate::error::{Error, Result};

/// Subcommand that turns the binary into a worker process.
pub const WORKER_SUBCOMMAND: &str = "factor-worker";

struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl WorkerProcess {
    fn spawn(program: &Path) -> io::Result<Self> {
        let mut child = Command::new(program)
            .arg(WORKER_SUBCOMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::other("worker pipes were not created"));
            }
        };

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }

    fn request(&mut self, n: u64) -> io::Result<u64> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker input closed"))?;
        writeln!(stdin, "{}", n)?;
        stdin.flush()?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "worker exited before replying",
            ));
        }

        self.line.trim().parse::<u64>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad worker reply {:?}: {}", self.line.trim(), e),
            )
        })
    }

    /// Close the child's input and wait for it to exit.
    fn shutdown(mut self) -> io::Result<()> {
        self.stdin.take();
        let status = self.child.wait()?;
        if !status.success() {
            return Err(io::Error::other(format!("worker exited with {}", status)));
        }
        Ok(())
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        // Only reached with a live child when the pool is abandoning work.
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Count prime factors of each number across `num_workers` child processes.
///
/// Results are returned in input order. The first failing item stops dispatch on every
/// worker; children of the failed call are killed rather than drained.
pub fn execute_factor_counts(numbers: &[u64], num_workers: usize, program: &Path) -> Result<Vec<u64>> {
    if num_workers == 0 {
        return Err(Error::invalid_argument("worker count must be positive"));
    }
    if numbers.is_empty() {
        return Ok(Vec::new());
    }

    // Processes are not free to keep idle, so never start more than there are items.
    let spawn_count = num_workers.min(numbers.len());
    let mut workers = Vec::with_capacity(spawn_count);
    for _ in 0..spawn_count {
        let worker = WorkerProcess::spawn(program).map_err(|e| {
            Error::resource_exhaustion(
                num_workers,
                format!("failed to spawn {}: {}", program.display(), e),
            )
        })?;
        workers.push(worker);
    }
    debug!(workers = spawn_count, items = numbers.len(), "worker processes started");

    let cursor = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);

    let outcomes: Vec<Result<Vec<(usize, u64)>>> = thread::scope(|scope| {
        let handles: Vec<_> = workers
            .into_iter()
            .map(|mut worker| {
                let cursor = &cursor;
                let failed = &failed;
                scope.spawn(move || -> Result<Vec<(usize, u64)>> {
                    let mut done = Vec::new();
                    while !failed.load(Ordering::Relaxed) {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        if index >= numbers.len() {
                            break;
                        }
                        match worker.request(numbers[index]) {
                            Ok(count) => done.push((index, count)),
                            Err(e) => {
                                failed.store(true, Ordering::Relaxed);
                                return Err(Error::worker_failure(index, e.to_string()));
                            }
                        }
                    }

                    if let Err(e) = worker.shutdown() {
                        warn!("worker shutdown: {}", e);
                    }
                    Ok(done)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::worker_failure(0, "dispatch thread panicked")))
            })
            .collect()
    });

    let mut results = Vec::with_capacity(numbers.len());
    for outcome in outcomes {
        results.extend(outcome?);
    }

    // Sort results to maintain input order
    results.sort_by_key(|(index, _)| *index);
    if results.len() != numbers.len() {
        return Err(Error::worker_failure(
            results.len(),
            "pool stopped before every item was counted",
        ));
    }

    Ok(results.into_iter().map(|(_, count)| count).collect())
}

/// Worker side of the protocol: answer each input line with its factor count.
pub fn serve<R: BufRead, W: Write>(input: R, mut output: W) -> Result<()> {
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let n = trimmed
            .parse::<u64>()
            .map_err(|e| Error::parse(i + 1, format!("{:?}: {}", trimmed, e)))?;
        writeln!(output, "{}", factor_count(n))?;
        output.flush()?;
    }

    Ok(())
}
