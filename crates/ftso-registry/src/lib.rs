//! # ftso-registry
//!
//! Reward epoch resolution: who votes, with what weight, on which feeds.
//!
//! Registration data for a reward epoch (signing policy, voter
//! registrations, reward offers) is read from the ledger index once and
//! cached for the lifetime of the epoch.
//!
//! ## Modules
//!
//! - [`feeds`] — Canonical feed order from reward offers
//! - [`epoch`] — [`RewardEpoch`]: policy, registrations and weight lookups
//! - [`resolver`] — Caching resolver over the ledger index

pub mod epoch;
pub mod feeds;
pub mod resolver;

pub use epoch::RewardEpoch;
pub use resolver::EpochResolver;

use ftso_types::RewardEpochId;

/// Error types for reward epoch resolution.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Signing policy and voter registrations do not match one to one.
    #[error("registration mismatch in reward epoch {reward_epoch_id}: {reason}")]
    RegistrationMismatch {
        /// Reward epoch being resolved.
        reward_epoch_id: RewardEpochId,
        /// What did not match.
        reason: String,
    },

    /// No signing policy has been published for the reward epoch yet.
    #[error("signing policy for reward epoch {0} not found")]
    MissingSigningPolicy(RewardEpochId),

    /// Ledger index failure.
    #[error("index error: {0}")]
    Index(#[from] ftso_index::IndexError),
}

/// Convenience result type for reward epoch resolution.
pub type Result<T> = std::result::Result<T, RegistryError>;
