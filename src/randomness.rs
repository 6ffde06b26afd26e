//! Bounded random integers and in-place shuffling.
//!
//! Everything takes an `impl Rng` so callers can seed a deterministic
//! generator in tests while production code passes `rand::rng()`.

use rand::Rng;

/// Random integer uniformly in `[min, max]` inclusive.
///
/// Callers must guarantee `max >= min`.
pub fn random_in_range(rng: &mut impl Rng, min: usize, max: usize) -> usize {
    rng.random_range(min..=max)
}

/// In-place Fisher-Yates shuffle. Every permutation is equally likely.
pub fn shuffle<T>(rng: &mut impl Rng, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = random_in_range(rng, 0, i);
        items.swap(i, j);
    }
}
