//! Nonce guessing: the proof-of-work predicate each worker calls.

use serde::Serialize;
use thiserror::Error;

use crate::block::{Block, BlockError, BlockTemplate};
use crate::difficulty::hash_meets_target;
use crate::hash::BlockIdHasher;

/// A guesser could not evaluate a nonce.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("nonce {nonce} could not be evaluated: {reason}")]
pub struct GuessError {
    /// The nonce being evaluated.
    pub nonce: u64,
    /// What went wrong.
    pub reason: String,
}

impl GuessError {
    pub fn new(nonce: u64, reason: impl Into<String>) -> Self {
        GuessError {
            nonce,
            reason: reason.into(),
        }
    }
}

/// Outcome of hashing one candidate nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guess {
    /// Whether the hash meets the difficulty target.
    pub valid: bool,
    /// The block hash produced by the nonce.
    pub hash: [u8; 32],
}

/// Evaluates candidate nonces against a fixed block.
///
/// Implementations must be pure: the same nonce always gives the same
/// answer, and calling from many threads at once needs no locking.
pub trait NonceGuesser: Send + Sync {
    /// The value a successful search produces.
    type Solution: Send + 'static;

    /// Hash a candidate nonce and check it against the target.
    fn try_nonce(&self, nonce: u64) -> Result<Guess, GuessError>;

    /// Package a valid nonce and its hash as a solution.
    fn solution(&self, nonce: u64, hash: [u8; 32]) -> Self::Solution;
}

/// Guesser for Zimcoin block templates using the SHA256 block id.
#[derive(Debug, Clone)]
pub struct TemplateGuesser {
    template: BlockTemplate,
    hasher: BlockIdHasher,
    target: [u8; 32],
}

impl TemplateGuesser {
    /// Precompute the hash prefix and target for a template.
    pub fn new(template: BlockTemplate) -> Result<Self, BlockError> {
        template.validate()?;
        let hasher = template.hasher();
        let target = template.target();
        Ok(TemplateGuesser {
            template,
            hasher,
            target,
        })
    }

    pub fn template(&self) -> &BlockTemplate {
        &self.template
    }
}

impl NonceGuesser for TemplateGuesser {
    type Solution = Block;

    #[inline]
    fn try_nonce(&self, nonce: u64) -> Result<Guess, GuessError> {
        let hash = self.hasher.finalize(nonce);
        Ok(Guess {
            valid: hash_meets_target(&hash, &self.target),
            hash,
        })
    }

    fn solution(&self, nonce: u64, hash: [u8; 32]) -> Block {
        self.template.seal(nonce, hash)
    }
}

/// Guesser backed by an externally supplied validity predicate.
///
/// The solution is the winning nonce itself.
pub struct FnGuesser<F> {
    predicate: F,
}

impl<F> FnGuesser<F>
where
    F: Fn(u64) -> Result<Guess, GuessError> + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        FnGuesser { predicate }
    }
}

impl<F> NonceGuesser for FnGuesser<F>
where
    F: Fn(u64) -> Result<Guess, GuessError> + Send + Sync,
{
    type Solution = u64;

    fn try_nonce(&self, nonce: u64) -> Result<Guess, GuessError> {
        (self.predicate)(nonce)
    }

    fn solution(&self, nonce: u64, _hash: [u8; 32]) -> u64 {
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(difficulty: u128) -> BlockTemplate {
        BlockTemplate::new([0x01; 32], 1, [0x02; 20], vec![], 1_600_000_000, difficulty).unwrap()
    }

    #[test]
    fn test_template_guesser_is_deterministic() {
        let guesser = TemplateGuesser::new(template(4)).unwrap();
        let first = guesser.try_nonce(12345).unwrap();
        let second = guesser.try_nonce(12345).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash, guesser.template().block_id(12345));
    }

    #[test]
    fn test_difficulty_one_accepts_everything() {
        let guesser = TemplateGuesser::new(template(1)).unwrap();
        assert!((0..100).all(|n| guesser.try_nonce(n).unwrap().valid));
    }

    #[test]
    fn test_valid_guess_seals_verifiable_block() {
        let guesser = TemplateGuesser::new(template(16)).unwrap();
        let (nonce, guess) = (1u64..)
            .map(|n| (n, guesser.try_nonce(n).unwrap()))
            .find(|(_, g)| g.valid)
            .unwrap();
        let block = guesser.solution(nonce, guess.hash);
        assert_eq!(block.nonce, nonce);
        assert_eq!(block.verify(16), Ok(()));
    }

    #[test]
    fn test_fn_guesser() {
        let guesser = FnGuesser::new(|nonce| {
            if nonce == 13 {
                return Err(GuessError::new(nonce, "unlucky"));
            }
            Ok(Guess {
                valid: nonce == 42,
                hash: [0u8; 32],
            })
        });
        assert!(guesser.try_nonce(42).unwrap().valid);
        assert!(!guesser.try_nonce(41).unwrap().valid);
        assert!(guesser.try_nonce(13).is_err());
        assert_eq!(guesser.solution(42, [0u8; 32]), 42);
    }
}
