use std::fs::File;
use std::io::{self as stdio, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use parreduce::compute::WORD_SIZE;
use parreduce::io::{create_progress_bar, generate_blob, generate_numbers, NumberReader, U32Blob};
use parreduce::process;
use parreduce::{
    parallel_factor_count_with, parallel_sum_with, sequential_factor_count, sequential_sum_reader,
    Isolation, SumOptions, WorkerPool, DEFAULT_GRANULARITY,
};

#[derive(Parser, Debug)]
#[command(name = "parreduce")]
#[command(about = "Compare sequential and parallel reductions over large inputs", long_about = None)]
struct Args {
    /// Log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write random big-endian u32 values to a binary file
    GenerateBlob {
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Number of u32 values to write
        #[arg(short = 'n', long)]
        count: u64,

        /// Disable progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write random integers below 2^31, one per line
    GenerateNumbers {
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Number of integers to write
        #[arg(short = 'n', long)]
        count: u64,

        /// Disable progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Sum a file of big-endian u32 values sequentially and over memory-mapped chunks
    Sum {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Number of worker threads (defaults to number of CPU cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Chunk alignment in bytes; a positive multiple of 4
        #[arg(long, default_value_t = DEFAULT_GRANULARITY)]
        granularity: usize,

        /// Generate INPUT with this many values when it does not exist
        #[arg(long, value_name = "COUNT")]
        generate: Option<u64>,

        /// Disable progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Total the prime factors of a list of integers sequentially and in parallel
    Factors {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Number of workers (defaults to number of CPU cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Which parallel variants to run
        #[arg(long, value_enum, default_value_t = IsolationArg::All)]
        isolation: IsolationArg,

        /// Generate INPUT with this many integers when it does not exist
        #[arg(long, value_name = "COUNT")]
        generate: Option<u64>,

        /// Disable progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Answer factor-count requests on stdin (used by the process pool)
    #[command(hide = true)]
    FactorWorker,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum IsolationArg {
    Thread,
    Process,
    All,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::GenerateBlob { output, count, quiet } => {
            generate_blob_file(&output, count, quiet)?;
            println!("Wrote {} values to {}", count, output.display());
        }
        Commands::GenerateNumbers { output, count, quiet } => {
            generate_numbers_file(&output, count, quiet)?;
            println!("Wrote {} numbers to {}", count, output.display());
        }
        Commands::Sum {
            input,
            threads,
            granularity,
            generate,
            quiet,
        } => run_sum(&input, threads, granularity, generate, quiet)?,
        Commands::Factors {
            input,
            threads,
            isolation,
            generate,
            quiet,
        } => run_factors(&input, threads, isolation, generate, quiet)?,
        Commands::FactorWorker => {
            process::serve(stdio::stdin().lock(), stdio::stdout().lock())?;
        }
    }

    Ok(())
}

fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(stdio::stderr)
        .init();
}

fn generate_blob_file(path: &Path, count: u64, quiet: bool) -> Result<()> {
    let progress = if !quiet {
        Some(create_progress_bar(count, "values"))
    } else {
        None
    };

    generate_blob(path, count, &mut rand::thread_rng(), progress.as_ref())
        .with_context(|| format!("Failed to generate {}", path.display()))?;

    if let Some(ref pb) = progress {
        pb.finish_with_message("Generation complete");
    }
    Ok(())
}

fn generate_numbers_file(path: &Path, count: u64, quiet: bool) -> Result<()> {
    let progress = if !quiet {
        Some(create_progress_bar(count, "numbers"))
    } else {
        None
    };

    generate_numbers(path, count, &mut rand::thread_rng(), progress.as_ref())
        .with_context(|| format!("Failed to generate {}", path.display()))?;

    if let Some(ref pb) = progress {
        pb.finish_with_message("Generation complete");
    }
    Ok(())
}

/// Make sure `input` exists, generating it first when a count was given.
fn ensure_input(
    input: &Path,
    generate: Option<u64>,
    generator: impl FnOnce(&Path, u64) -> Result<()>,
) -> Result<()> {
    if input.exists() {
        return Ok(());
    }

    match generate {
        Some(count) => {
            println!("Generating random numbers...");
            generator(input, count)
        }
        None => anyhow::bail!("Input file does not exist: {}", input.display()),
    }
}

fn measure<T: std::fmt::Display>(label: &str, f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
    println!("Measuring {}", label);
    let start_time = Instant::now();
    let result = f()?;
    let elapsed = start_time.elapsed();
    println!("Time: {:.6} seconds", elapsed.as_secs_f64());
    println!("Result: {}", result);
    Ok((result, elapsed))
}

fn report(baseline: (&str, u64, Duration), candidate: (&str, u64, Duration)) {
    let (baseline_label, baseline_result, baseline_time) = baseline;
    let (candidate_label, candidate_result, candidate_time) = candidate;

    println!("Results are the same: {}", baseline_result == candidate_result);
    if candidate_time > baseline_time {
        println!(
            "{} is faster by {:.6} seconds",
            baseline_label,
            (candidate_time - baseline_time).as_secs_f64()
        );
    } else {
        println!(
            "{} is faster by {:.6} seconds",
            candidate_label,
            (baseline_time - candidate_time).as_secs_f64()
        );
    }
}

fn run_sum(
    input: &Path,
    threads: Option<usize>,
    granularity: usize,
    generate: Option<u64>,
    quiet: bool,
) -> Result<()> {
    if granularity == 0 || !granularity.is_multiple_of(WORD_SIZE) {
        anyhow::bail!("Granularity must be a positive multiple of {}, got {}", WORD_SIZE, granularity);
    }

    ensure_input(input, generate, |path, count| generate_blob_file(path, count, quiet))?;

    let blob = U32Blob::open(input)
        .with_context(|| format!("Failed to map input file: {}", input.display()))?;
    println!(
        "Total values: {} ({:.2} MB)",
        blob.total_words(),
        blob.len() as f64 / (1024.0 * 1024.0)
    );

    let pool = WorkerPool::new(threads)?;
    println!("Using {} worker threads", pool.num_workers());
    let options = SumOptions { granularity };

    let (sequential, sequential_time) = measure("straightforward sum", || {
        let file = File::open(input)
            .with_context(|| format!("Failed to open input file: {}", input.display()))?;
        Ok(sequential_sum_reader(BufReader::new(file))?)
    })?;

    let (parallel, parallel_time) = measure("mm concurrent sum", || {
        Ok(parallel_sum_with(blob.as_bytes(), pool.num_workers(), &options)?)
    })?;

    report(
        ("Straightforward", sequential, sequential_time),
        ("Concurrent", parallel, parallel_time),
    );
    Ok(())
}

fn run_factors(
    input: &Path,
    threads: Option<usize>,
    isolation: IsolationArg,
    generate: Option<u64>,
    quiet: bool,
) -> Result<()> {
    ensure_input(input, generate, |path, count| generate_numbers_file(path, count, quiet))?;

    let (sequential, sequential_time) = measure("count_factors_sum_straightforward", || {
        let numbers = NumberReader::open(input)
            .with_context(|| format!("Failed to open input file: {}", input.display()))?;
        Ok(sequential_factor_count(numbers)?)
    })?;

    let numbers = NumberReader::open(input)
        .and_then(|reader| reader.collect::<parreduce::Result<Vec<u64>>>())
        .with_context(|| format!("Failed to read numbers from {}", input.display()))?;
    let pool = WorkerPool::new(threads)?;
    println!("Using {} workers over {} numbers", pool.num_workers(), numbers.len());

    let mut variants = Vec::new();
    if matches!(isolation, IsolationArg::Thread | IsolationArg::All) {
        variants.push(("Threads", "count_factors_sum_threads", Isolation::Thread));
    }
    if matches!(isolation, IsolationArg::Process | IsolationArg::All) {
        let program = std::env::current_exe().context("Failed to locate own executable")?;
        variants.push(("Processes", "count_factors_sum_multiproc", Isolation::Process { program }));
    }

    for (name, label, isolation) in variants {
        let pool = pool.clone().with_isolation(isolation);
        let (parallel, parallel_time) =
            measure(label, || Ok(parallel_factor_count_with(&numbers, &pool)?))?;
        report(
            ("Straightforward", sequential, sequential_time),
            (name, parallel, parallel_time),
        );
    }

    Ok(())
}
