//! Zimcoin block templates and mined blocks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::difficulty::{difficulty_to_target, hash_meets_target};
use crate::hash::BlockIdHasher;

/// Maximum number of transactions a block may carry.
pub const MAX_TRANSACTIONS: usize = 25;

/// Errors raised while building or checking a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Difficulty must be at least 1.
    #[error("difficulty must be nonzero")]
    ZeroDifficulty,
    /// Too many transactions for one block.
    #[error("too many transactions on this block: {0} > 25")]
    TooManyTransactions(usize),
    /// A hex field did not decode to the expected width.
    #[error("invalid {field}: expected {expected} hex-encoded bytes")]
    InvalidHexField {
        /// Name of the offending field.
        field: &'static str,
        /// Expected byte length.
        expected: usize,
    },
    /// The block was mined at a different difficulty than expected.
    #[error("incorrect difficulty: expected {expected}, block has {actual}")]
    DifficultyMismatch {
        /// Difficulty the caller expects.
        expected: u128,
        /// Difficulty recorded in the block.
        actual: u128,
    },
    /// The stored block id does not match the block's fields.
    #[error("specified block id does not match details")]
    IdMismatch,
    /// The block id is above the difficulty target.
    #[error("invalid proof of work")]
    InsufficientWork,
}

/// Everything needed to mine a block except the nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    /// Block id of the previous block.
    #[serde(with = "hex::serde")]
    pub previous: [u8; 32],
    /// Number of blocks before this one on the chain.
    pub height: u64,
    /// Public key hash of the miner.
    #[serde(with = "hex::serde")]
    pub miner: [u8; 20],
    /// Ids of the included transactions, in block order.
    #[serde(with = "txid_list")]
    pub transaction_ids: Vec<[u8; 32]>,
    /// Unix time of block creation.
    pub timestamp: u64,
    /// Proof-of-work difficulty.
    pub difficulty: u128,
}

impl BlockTemplate {
    /// Create a new block template.
    pub fn new(
        previous: [u8; 32],
        height: u64,
        miner: [u8; 20],
        transaction_ids: Vec<[u8; 32]>,
        timestamp: u64,
        difficulty: u128,
    ) -> Result<Self, BlockError> {
        let template = BlockTemplate {
            previous,
            height,
            miner,
            transaction_ids,
            timestamp,
            difficulty,
        };
        template.validate()?;
        Ok(template)
    }

    /// Create a template from hex-encoded byte fields.
    pub fn from_hex(
        previous_hex: &str,
        height: u64,
        miner_hex: &str,
        txid_hexes: &[String],
        timestamp: u64,
        difficulty: u128,
    ) -> Result<Self, BlockError> {
        let previous = decode_fixed::<32>(previous_hex, "previous block id")?;
        let miner = decode_fixed::<20>(miner_hex, "miner key hash")?;
        let transaction_ids = txid_hexes
            .iter()
            .map(|txid| decode_fixed::<32>(txid, "transaction id"))
            .collect::<Result<Vec<_>, _>>()?;

        BlockTemplate::new(previous, height, miner, transaction_ids, timestamp, difficulty)
    }

    /// Check the structural limits a miner relies on.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.difficulty == 0 {
            return Err(BlockError::ZeroDifficulty);
        }
        if self.transaction_ids.len() > MAX_TRANSACTIONS {
            return Err(BlockError::TooManyTransactions(self.transaction_ids.len()));
        }
        Ok(())
    }

    /// Hasher primed with every field except the nonce.
    pub fn hasher(&self) -> BlockIdHasher {
        BlockIdHasher::new(
            &self.previous,
            &self.miner,
            &self.transaction_ids,
            self.timestamp,
            self.difficulty,
        )
    }

    /// The 256-bit target a block id must not exceed.
    pub fn target(&self) -> [u8; 32] {
        difficulty_to_target(self.difficulty)
    }

    /// Compute the block id for a candidate nonce.
    pub fn block_id(&self, nonce: u64) -> [u8; 32] {
        self.hasher().finalize(nonce)
    }

    /// Seal the template with a nonce and its block id.
    pub fn seal(&self, nonce: u64, block_id: [u8; 32]) -> Block {
        Block {
            previous: self.previous,
            height: self.height,
            miner: self.miner,
            transaction_ids: self.transaction_ids.clone(),
            timestamp: self.timestamp,
            difficulty: self.difficulty,
            block_id,
            nonce,
        }
    }
}

/// A mined block carrying its proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(with = "hex::serde")]
    pub previous: [u8; 32],
    pub height: u64,
    #[serde(with = "hex::serde")]
    pub miner: [u8; 20],
    #[serde(with = "txid_list")]
    pub transaction_ids: Vec<[u8; 32]>,
    pub timestamp: u64,
    pub difficulty: u128,
    /// Block id for this block.
    #[serde(with = "hex::serde")]
    pub block_id: [u8; 32],
    /// Nonce solution to the proof-of-work puzzle.
    pub nonce: u64,
}

impl Block {
    /// The template this block was mined from.
    pub fn template(&self) -> BlockTemplate {
        BlockTemplate {
            previous: self.previous,
            height: self.height,
            miner: self.miner,
            transaction_ids: self.transaction_ids.clone(),
            timestamp: self.timestamp,
            difficulty: self.difficulty,
        }
    }

    /// Verify the block id and proof of work against an expected difficulty.
    pub fn verify(&self, difficulty: u128) -> Result<(), BlockError> {
        if self.difficulty != difficulty {
            return Err(BlockError::DifficultyMismatch {
                expected: difficulty,
                actual: self.difficulty,
            });
        }
        let template = self.template();
        template.validate()?;
        if template.block_id(self.nonce) != self.block_id {
            return Err(BlockError::IdMismatch);
        }
        if !hash_meets_target(&self.block_id, &template.target()) {
            return Err(BlockError::InsufficientWork);
        }
        Ok(())
    }

    /// Block id as lowercase hex.
    pub fn block_id_hex(&self) -> String {
        hex::encode(self.block_id)
    }
}

fn decode_fixed<const N: usize>(
    input: &str,
    field: &'static str,
) -> Result<[u8; N], BlockError> {
    let invalid = || BlockError::InvalidHexField { field, expected: N };
    let bytes = hex::decode(input.trim()).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

mod txid_list {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(txids: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(txids.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|txid| {
                let mut out = [0u8; 32];
                hex::decode_to_slice(txid, &mut out).map_err(D::Error::custom)?;
                Ok(out)
            })
            .collect()
    }
}
