//! SHA256 block id hashing.

use sha2::{Digest, Sha256};

/// Incremental block id hasher.
///
/// Holds the SHA256 state after absorbing every block field except the
/// nonce, so a miner hashes the fixed prefix once and clones the state for
/// each guess.
#[derive(Clone)]
pub struct BlockIdHasher {
    prefix: Sha256,
}

impl BlockIdHasher {
    /// Absorb the nonce-independent block fields.
    ///
    /// Field order and widths: previous id, miner key hash, concatenated
    /// transaction ids, timestamp (8 bytes LE), difficulty (16 bytes LE).
    pub fn new(
        previous: &[u8; 32],
        miner: &[u8; 20],
        transaction_ids: &[[u8; 32]],
        timestamp: u64,
        difficulty: u128,
    ) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(previous);
        prefix.update(miner);
        for txid in transaction_ids {
            prefix.update(txid);
        }
        prefix.update(timestamp.to_le_bytes());
        prefix.update(difficulty.to_le_bytes());
        BlockIdHasher { prefix }
    }

    /// Finish the block id for a candidate nonce.
    ///
    /// A zero nonce appends nothing, so `finalize(0)` equals the id of the
    /// bare prefix.
    #[inline]
    pub fn finalize(&self, nonce: u64) -> [u8; 32] {
        let mut attempt = self.prefix.clone();
        if nonce != 0 {
            attempt.update(nonce.to_le_bytes());
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(&attempt.finalize());
        result
    }
}

impl core::fmt::Debug for BlockIdHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockIdHasher").finish_non_exhaustive()
    }
}
