//! Random kennitala generation.
//!
//! Generated values carry a plausible date (day 1-28 so every month is
//! valid), a random sequence and a valid century indicator. Candidates
//! whose first eight digits have no check digit are drawn again.
//!
//! The generator implements `Iterator<Item = Kennitala>`.
//! Use `next_kennitala()` for the explicit domain API.

use rand::Rng;
use rand::rngs::ThreadRng;
use tracing::{trace, warn};

use crate::kennitala::{COMPANY_DAY_OFFSET, EntityKind, KENNITALA_LEN, Kennitala, check_digit};

/// Century indicators the decoder understands.
const CENTURY_DIGITS: [u8; 3] = [8, 9, 0];

fn split(n: u8) -> [u8; 2] {
    [n / 10, n % 10]
}

// Position 8 is left at zero for the caller to fill in.
fn candidate<R: Rng>(kind: EntityKind, rng: &mut R) -> [u8; KENNITALA_LEN] {
    let mut day: u8 = rng.random_range(1..=28);
    if kind == EntityKind::Company {
        day += COMPANY_DAY_OFFSET;
    }
    let [d1, d2] = split(day);
    let [m1, m2] = split(rng.random_range(1..=12));
    let [y1, y2] = split(rng.random_range(0..=99));
    let [s1, s2] = split(rng.random_range(0..=99));
    let century = CENTURY_DIGITS[rng.random_range(0..CENTURY_DIGITS.len())];

    [d1, d2, m1, m2, y1, y2, s1, s2, 0, century]
}

impl Kennitala {
    /// Generate a random valid kennitala using the thread-local RNG.
    pub fn generate(kind: EntityKind) -> Self {
        Self::generate_with(kind, &mut rand::rng())
    }

    /// Generate a random valid kennitala from `rng`.
    pub fn generate_with<R: Rng>(kind: EntityKind, rng: &mut R) -> Self {
        loop {
            let mut values = candidate(kind, rng);
            let Some(check) = check_digit(&values) else {
                trace!(kind = kind.as_str(), "candidate has no check digit, resampling");
                continue;
            };
            values[8] = check;

            let checked = Self::from_values(values);
            debug_assert!(
                checked.is_ok(),
                "validator rejected generated candidate {values:?}: {checked:?}"
            );
            match checked {
                Ok(kt) => return kt,
                Err(err) => {
                    warn!(error = %err, kind = kind.as_str(), "validator rejected generated candidate");
                }
            }
        }
    }
}

/// Kennitala generator for a single entity kind.
pub struct KennitalaGen<R = ThreadRng> {
    kind: EntityKind,
    rng: R,
}

impl KennitalaGen<ThreadRng> {
    /// Create a generator backed by the thread-local RNG.
    pub fn new(kind: EntityKind) -> Self {
        Self::with_rng(kind, rand::rng())
    }
}

impl Default for KennitalaGen<ThreadRng> {
    fn default() -> Self {
        Self::new(EntityKind::Person)
    }
}

impl<R: Rng> KennitalaGen<R> {
    /// Create a generator with an explicit randomness source.
    pub fn with_rng(kind: EntityKind, rng: R) -> Self {
        Self { kind, rng }
    }

    /// Generate the next kennitala (domain API).
    pub fn next_kennitala(&mut self) -> Kennitala {
        Kennitala::generate_with(self.kind, &mut self.rng)
    }

    /// Generate n values.
    pub fn next_n(&mut self, n: usize) -> Vec<Kennitala> {
        self.take(n).collect()
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl<R: Rng> Iterator for KennitalaGen<R> {
    type Item = Kennitala;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_kennitala())
    }
}
