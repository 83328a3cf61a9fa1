use crate::error::{Error, Result};

/// Width of one packed big-endian unsigned integer.
pub const WORD_SIZE: usize = 4;

/// Sum the big-endian u32 words packed in `data`.
///
/// `offset` is only used to report where a misaligned chunk starts.
pub fn sum_be_u32(data: &[u8], offset: usize) -> Result<u64> {
    if !data.len().is_multiple_of(WORD_SIZE) {
        return Err(Error::InvalidChunkAlignment {
            offset,
            length: data.len(),
            word_size: WORD_SIZE,
        });
    }

    Ok(data
        .chunks_exact(WORD_SIZE)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]) as u64)
        .fold(0u64, u64::wrapping_add))
}

/// Number of prime factors of `n` counted with multiplicity, by trial division.
///
/// `factor_count(1) == 0`; `0` has no factorization and also yields 0.
pub fn factor_count(mut n: u64) -> u64 {
    let mut count = 0;
    let mut candidate = 2u64;

    while candidate <= n / candidate {
        while n % candidate == 0 {
            count += 1;
            n /= candidate;
        }
        candidate += 1;
    }

    if n > 1 {
        count += 1;
    }

    count
}
