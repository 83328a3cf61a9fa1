use parreduce::compute::sum_be_u32;
use parreduce::{
    parallel_factor_count, parallel_sum, parallel_sum_with, plan, reduce, sequential_factor_count,
    sequential_sum, ChunkDescriptor, Error, SumOptions, WorkerPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_blob(words: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..words).flat_map(|_| rng.gen::<u32>().to_be_bytes()).collect()
}

#[test]
fn test_parallel_sum_matches_sequential() {
    for (words, seed) in [(1, 1), (3, 2), (1024, 3), (1025, 4), (100_000, 5)] {
        let blob = random_blob(words, seed);
        let expected = sequential_sum(&blob).unwrap();
        let units = blob.len().div_ceil(4096);

        for workers in [1, 2, 4, 8, units + 5] {
            assert_eq!(
                parallel_sum(&blob, workers).unwrap(),
                expected,
                "words = {words}, workers = {workers}"
            );
        }
    }
}

#[test]
fn test_parallel_sum_with_small_granularity() {
    let blob = random_blob(999, 42);
    let expected = sequential_sum(&blob).unwrap();
    for granularity in [4, 8, 12, 64] {
        let units = blob.len().div_ceil(granularity);
        for workers in [1, 3, 7, 16, units + 5] {
            let options = SumOptions { granularity };
            assert_eq!(parallel_sum_with(&blob, workers, &options).unwrap(), expected);
        }
    }
}

#[test]
fn test_parallel_sum_is_idempotent() {
    let blob = random_blob(50_000, 9);
    let first = parallel_sum(&blob, 4).unwrap();
    for _ in 0..5 {
        assert_eq!(parallel_sum(&blob, 4).unwrap(), first);
    }
}

#[test]
fn test_four_values_split_across_two_workers() {
    let blob: Vec<u8> = [1u32, 2, 3, 4].iter().flat_map(|v| v.to_be_bytes()).collect();
    let chunks = plan(blob.len(), 2, 4).unwrap();
    assert_eq!(chunks, vec![ChunkDescriptor::new(0, 8), ChunkDescriptor::new(8, 8)]);

    let pool = WorkerPool::new(Some(2)).unwrap();
    let partials = pool
        .execute(&chunks, |chunk| sum_be_u32(&blob[chunk.range()], chunk.offset))
        .unwrap();
    assert_eq!(partials, vec![3, 7]);
    assert_eq!(reduce(partials), 10);
}

#[test]
fn test_single_word_with_surplus_workers() {
    let blob = 77u32.to_be_bytes();
    assert_eq!(plan(4, 8, 4).unwrap(), vec![ChunkDescriptor::new(0, 4)]);
    assert_eq!(parallel_sum_with(&blob, 8, &SumOptions { granularity: 4 }).unwrap(), 77);
}

#[test]
fn test_misaligned_blob_fails_whole_reduction() {
    let mut blob = random_blob(2048, 17);
    blob.extend_from_slice(&[1, 2]);

    for workers in [1, 2, 4] {
        let err = parallel_sum(&blob, workers).unwrap_err();
        assert!(matches!(err, Error::InvalidChunkAlignment { .. }), "workers = {workers}");
    }
    assert!(matches!(sequential_sum(&blob), Err(Error::InvalidChunkAlignment { .. })));
}

#[test]
fn test_granularity_not_multiple_of_word_size() {
    let blob = random_blob(10, 3);
    // 40 bytes over 7 workers of 6-byte granularity leaves 6-byte chunks
    let err = parallel_sum_with(&blob, 7, &SumOptions { granularity: 6 }).unwrap_err();
    assert!(matches!(err, Error::InvalidChunkAlignment { length: 6, .. }));
}

#[test]
fn test_zero_granularity_rejected() {
    let blob = random_blob(10, 3);
    let err = parallel_sum_with(&blob, 2, &SumOptions { granularity: 0 }).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
}

#[test]
fn test_parallel_factor_count_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(2024);
    let numbers: Vec<u64> = (0..2000).map(|_| rng.gen_range(1..1_000_000)).collect();
    let expected = sequential_factor_count(numbers.iter().copied().map(Ok)).unwrap();

    for workers in [1, 2, 4, 8, 64] {
        assert_eq!(parallel_factor_count(&numbers, workers).unwrap(), expected);
    }
}

#[test]
fn test_parallel_factor_count_of_nothing() {
    assert_eq!(parallel_factor_count(&[], 4).unwrap(), 0);
    assert_eq!(sequential_factor_count(Vec::new()).unwrap(), 0);
}
