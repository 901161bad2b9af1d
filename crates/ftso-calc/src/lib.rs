//! # ftso-calc
//!
//! Round calculation engine for the FTSO commit/reveal protocol.
//!
//! Everything in this crate is pure and deterministic: given the same
//! reveals, weights and feed order, every honest voter computes the same
//! medians, the same random value and therefore the same Merkle root.
//!
//! ## Modules
//!
//! - [`codec`] — Fixed-point feed value packing
//! - [`reveal`] — Commit/reveal matching, offenders and benching
//! - [`median`] — Weighted median and quartiles
//! - [`random`] — Combined random value and its security flag
//! - [`selection`] — Weighted random voter selection
//! - [`results`] — Round results, Merkle leaves and feed proofs

pub mod codec;
pub mod median;
pub mod random;
pub mod results;
pub mod reveal;
pub mod selection;

use ftso_types::VotingRoundId;

/// Error types for round calculation.
#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    /// A price does not fit the excess-2^31 wire form.
    #[error("value {value} for feed {feed} is outside the encodable range")]
    EncodingRange {
        /// Feed the value belongs to.
        feed: String,
        /// Scaled value that failed to encode.
        value: f64,
    },

    /// Packed values could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// No voter produced a valid reveal for the round.
    #[error("no valid reveals for voting round {0}")]
    NoValidReveals(VotingRoundId),

    /// Selection threshold above the allowed maximum.
    #[error("invalid threshold: {0} BIPS exceeds {max}", max = selection::MAX_THRESHOLD_BIPS)]
    InvalidThreshold(u64),

    /// Voter set is empty, has zero weight, or has mismatched arrays.
    #[error("empty voter set")]
    EmptyVoterSet,

    /// Merkle tree construction failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] ftso_crypto::CryptoError),
}

/// Convenience result type for round calculation.
pub type Result<T> = std::result::Result<T, CalcError>;
