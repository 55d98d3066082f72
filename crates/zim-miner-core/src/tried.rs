//! Per-worker record of nonces already attempted.

use std::collections::HashSet;

use rand::Rng;

use crate::stratum::Stratum;

/// Nonces one worker has already hashed inside its stratum.
///
/// Owned by a single worker and dropped when it exits.
#[derive(Debug)]
pub struct TriedSet {
    stratum: Stratum,
    tried: HashSet<u64>,
    duplicate_draws: u64,
}

impl TriedSet {
    pub fn new(stratum: Stratum) -> Self {
        TriedSet {
            stratum,
            tried: HashSet::new(),
            duplicate_draws: 0,
        }
    }

    pub fn stratum(&self) -> &Stratum {
        &self.stratum
    }

    /// Number of distinct nonces tried.
    pub fn len(&self) -> usize {
        self.tried.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tried.is_empty()
    }

    pub fn contains(&self, nonce: u64) -> bool {
        self.tried.contains(&nonce)
    }

    /// Random draws discarded because the nonce was already tried.
    pub fn duplicate_draws(&self) -> u64 {
        self.duplicate_draws
    }

    /// True once every nonce of the stratum has been tried.
    pub fn is_exhausted(&self) -> bool {
        self.tried.len() as u128 >= self.stratum.len()
    }

    /// Record a nonce. Returns false if it was already tried.
    ///
    /// Nonces outside the stratum are never recorded.
    pub fn insert(&mut self, nonce: u64) -> bool {
        self.stratum.contains(nonce) && self.tried.insert(nonce)
    }

    /// Draw an untried nonce uniformly at random and mark it tried.
    ///
    /// Repeats are redrawn up to `redraw_limit` times. Past that the draw
    /// probes forward from the last random pick to the next untried nonce,
    /// wrapping inside the stratum. Returns `None` once the stratum is
    /// exhausted.
    pub fn draw<R: Rng>(&mut self, rng: &mut R, redraw_limit: u32) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }

        let mut nonce = rng.gen_range(self.stratum.first..=self.stratum.last);
        if self.tried.insert(nonce) {
            return Some(nonce);
        }
        for _ in 0..redraw_limit {
            self.duplicate_draws += 1;
            nonce = rng.gen_range(self.stratum.first..=self.stratum.last);
            if self.tried.insert(nonce) {
                return Some(nonce);
            }
        }
        self.duplicate_draws += 1;

        let mut steps = 1u128;
        while steps < self.stratum.len() {
            let candidate = self.stratum.wrapping_step(nonce, steps);
            if self.tried.insert(candidate) {
                return Some(candidate);
            }
            steps += 1;
        }
        None
    }
}
