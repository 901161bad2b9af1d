//! # ftso-finalize
//!
//! Weighted-threshold finalization of round results.
//!
//! Voters sign the Merkle root they calculated. Anyone holding signatures
//! for the same root whose signing weight strictly exceeds the policy
//! threshold can finalize the round on-chain.
//!
//! ## Modules
//!
//! - [`message`] — Result message hashing, signing and signer recovery
//! - [`aggregator`] — Threshold aggregation of collected signatures
//! - [`eligibility`] — Weighted random choice of immediate finalizers

pub mod aggregator;
pub mod eligibility;
pub mod message;

pub use aggregator::try_finalize;

/// Error types for finalization.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// Signing or recovery failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] ftso_crypto::CryptoError),

    /// Finalizer selection failed.
    #[error("selection error: {0}")]
    Selection(#[from] ftso_calc::CalcError),
}

/// Convenience result type for finalization.
pub type Result<T> = std::result::Result<T, FinalizeError>;
