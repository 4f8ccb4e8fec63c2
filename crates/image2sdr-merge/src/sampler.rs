//! Random index sampling used to order tie-breaks.

use rand::Rng;

/// Sample `count` distinct indexes from `0..length` using the thread RNG.
///
/// See [`sample_indexes_with_rng`].
pub fn sample_indexes(length: usize, count: usize, ordered: bool) -> Vec<usize> {
    sample_indexes_with_rng(&mut rand::thread_rng(), length, count, ordered)
}

/// Sample `count` distinct indexes from `0..length`.
///
/// `count` is clamped to `length`. When `ordered` is true the result is a
/// circular run starting at a random offset (`s, s+1, ..` wrapping to 0);
/// otherwise every index is equally likely at every output position
/// (partial Fisher-Yates shuffle).
pub fn sample_indexes_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    count: usize,
    ordered: bool,
) -> Vec<usize> {
    let count = count.min(length);
    if count == 0 {
        return Vec::new();
    }

    if ordered {
        let start = rng.gen_range(0..length);
        return (0..count).map(|i| (start + i) % length).collect();
    }

    let mut pool: Vec<usize> = (0..length).collect();
    for i in 0..count {
        let pick = rng.gen_range(i..length);
        pool.swap(i, pick);
    }
    pool.truncate(count);
    pool
}
