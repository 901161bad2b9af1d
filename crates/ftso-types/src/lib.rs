//! # ftso-types
//!
//! Shared domain types used across the FTSO data provider workspace.
//!
//! ## Modules
//!
//! - [`feed`] — Feed identifiers, feeds and decoded feed values
//! - [`voting`] — Signing policies, voter registrations, reward offers and
//!   per-round submission payloads
//! - [`ledger`] — Decoded ledger events and transaction records
//! - [`epoch`] — Voting round / reward epoch timing arithmetic

pub mod epoch;
pub mod feed;
pub mod ledger;
pub mod voting;

pub use alloy_primitives::{Address, B256, U256};

pub use epoch::EpochSettings;
pub use feed::{Feed, FeedId, ValueWithDecimals};

/// Voting round identifier.
pub type VotingRoundId = u32;

/// Reward epoch identifier.
pub type RewardEpochId = u32;

/// Median-voting weight of a voter.
pub type Weight = u128;

/// Length of a feed identifier in bytes.
pub const FEED_ID_LEN: usize = 21;

/// Denominator for all basis-point quantities.
pub const TOTAL_BIPS: u64 = 10_000;

/// Error types for parsing shared domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A value had an unexpected byte length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Unknown contract name.
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// Epoch settings are inconsistent.
    #[error("invalid epoch settings: {0}")]
    InvalidSettings(String),
}

/// Convenience result type for shared domain values.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Strip an optional `0x` prefix from a hex string.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
