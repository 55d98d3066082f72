//! Nonce space partitioning.
//!
//! The configured nonce space is split into contiguous, disjoint strata, one
//! per worker. Together the strata cover the space exactly, so N workers
//! searching their own strata search the same nonces as one worker would.

use serde::{Deserialize, Serialize};

use crate::error::MineError;

/// An inclusive range of nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceSpace {
    /// Lowest nonce in the space.
    pub first: u64,
    /// Highest nonce in the space.
    pub last: u64,
}

impl NonceSpace {
    pub fn new(first: u64, last: u64) -> Self {
        NonceSpace { first, last }
    }

    /// Every 64-bit nonce.
    pub fn full() -> Self {
        NonceSpace::new(0, u64::MAX)
    }

    /// Number of nonces in the space. Zero if the bounds are inverted.
    pub fn len(&self) -> u128 {
        if self.last < self.first {
            0
        } else {
            (self.last - self.first) as u128 + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split the space into `workers` contiguous strata.
    ///
    /// Sizes differ by at most one; the first `len % workers` strata take
    /// the extra nonce.
    pub fn partition(&self, workers: usize) -> Result<Vec<Stratum>, MineError> {
        if workers == 0 {
            return Err(MineError::NoWorkers);
        }
        let space = self.len();
        if space < workers as u128 {
            return Err(MineError::SpaceTooSmall { space, workers });
        }

        let base = space / workers as u128;
        let extra = space % workers as u128;

        let mut strata = Vec::with_capacity(workers);
        let mut next = self.first as u128;
        for index in 0..workers {
            let size = base + u128::from((index as u128) < extra);
            let first = next;
            let last = first + size - 1;
            strata.push(Stratum {
                index,
                first: first as u64,
                last: last as u64,
            });
            next = last + 1;
        }
        Ok(strata)
    }
}

impl Default for NonceSpace {
    fn default() -> Self {
        NonceSpace::new(30_000_000_000, u64::MAX)
    }
}

/// The slice of the nonce space owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stratum {
    /// Position of this stratum (and its worker) in the partition.
    pub index: usize,
    /// Lowest nonce, inclusive.
    pub first: u64,
    /// Highest nonce, inclusive.
    pub last: u64,
}

impl Stratum {
    /// Number of nonces in the stratum. Never zero.
    pub fn len(&self) -> u128 {
        debug_assert!(self.first <= self.last, "inverted stratum {self:?}");
        (self.last - self.first) as u128 + 1
    }

    pub fn contains(&self, nonce: u64) -> bool {
        (self.first..=self.last).contains(&nonce)
    }

    /// The nonce `steps` places after `nonce`, wrapping inside the stratum.
    pub fn wrapping_step(&self, nonce: u64, steps: u128) -> u64 {
        debug_assert!(self.contains(nonce), "nonce {nonce} outside {self:?}");
        let offset = (nonce - self.first) as u128;
        let wrapped = (offset + steps) % self.len();
        self.first + wrapped as u64
    }
}
