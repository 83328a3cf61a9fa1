use std::path::PathBuf;

use parreduce::compute::factor_count;
use parreduce::process::execute_factor_counts;
use parreduce::{parallel_factor_count_with, Error, Isolation, WorkerPool};

fn worker_program() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_parreduce"))
}

fn process_pool(workers: usize) -> WorkerPool {
    WorkerPool::new(Some(workers))
        .unwrap()
        .with_isolation(Isolation::Process {
            program: worker_program(),
        })
}

#[test]
fn test_process_factor_counts_in_order() {
    let counts = execute_factor_counts(&[1, 2, 4, 17, 100], 2, &worker_program()).unwrap();
    assert_eq!(counts, vec![0, 1, 2, 1, 4]);
}

#[test]
fn test_process_pool_matches_threads() {
    let numbers: Vec<u64> = (1..=3000).map(|i| i * 7919 + 13).collect();
    let expected: u64 = numbers.iter().map(|&n| factor_count(n)).sum();

    let thread_pool = WorkerPool::new(Some(4)).unwrap();
    assert_eq!(parallel_factor_count_with(&numbers, &thread_pool).unwrap(), expected);

    for workers in [1, 3, 4] {
        let pool = process_pool(workers);
        assert_eq!(parallel_factor_count_with(&numbers, &pool).unwrap(), expected);
    }
}

#[test]
fn test_more_processes_than_items() {
    let pool = process_pool(8);
    assert_eq!(parallel_factor_count_with(&[100], &pool).unwrap(), 4);
}

#[test]
fn test_missing_worker_program() {
    let pool = WorkerPool::new(Some(2))
        .unwrap()
        .with_isolation(Isolation::Process {
            program: PathBuf::from("/nonexistent/parreduce"),
        });
    let err = parallel_factor_count_with(&[4, 6], &pool).unwrap_err();
    assert!(matches!(err, Error::ResourceExhaustion { .. }));
}
