//! Partial redaction of a movie title for hints.

use rand::Rng;

use crate::randomness::random_in_range;
use crate::types::{HINT_CHARACTER, HINT_PERCENT_TO_REPLACE};

/// Redact a random subset of a title's alphanumeric characters with `_`.
///
/// The number of redacted positions is 20% of the title length, rounded up,
/// capped at the number of alphanumeric characters actually present so that
/// titles made mostly of punctuation cannot stall the sampler. Spaces and
/// punctuation are never redacted.
pub fn create_hint(rng: &mut impl Rng, title: &str) -> String {
    let mut chars: Vec<char> = title.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let alphanumeric_count = chars.iter().filter(|c| c.is_ascii_alphanumeric()).count();
    let quota = chars.len() * HINT_PERCENT_TO_REPLACE;
    let to_replace = (quota.div_ceil(100)).min(alphanumeric_count);

    let mut replaced = 0;
    while replaced < to_replace {
        let index = random_in_range(rng, 0, chars.len() - 1);
        if chars[index] == HINT_CHARACTER || !chars[index].is_ascii_alphanumeric() {
            continue;
        }
        chars[index] = HINT_CHARACTER;
        replaced += 1;
    }

    chars.into_iter().collect()
}
