/// Fold partial results into one total.
///
/// Addition wraps at `u64`, so the total does not depend on the order partials arrive in.
pub fn reduce<I>(partials: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    partials.into_iter().fold(0u64, u64::wrapping_add)
}
