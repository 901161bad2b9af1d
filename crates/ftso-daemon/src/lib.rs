//! # ftso-daemon
//!
//! The FTSO data provider daemon.
//!
//! One [`scheduler::Scheduler`] per voter walks every voting round through
//! commit, reveal, calculate-and-sign and finalization against a ledger
//! index. In `memory` mode the daemon runs a self-contained [`devnet`] with
//! several local voters; in `sqlite` mode it follows an externally
//! populated index with a single voter and dry-run submission.
//!
//! ## Modules
//!
//! - [`config`] — TOML configuration
//! - [`clock`] — Unix clock on the tokio timer
//! - [`prices`] — Price providers
//! - [`submit`] — Transaction submission boundary
//! - [`ledger`] — In-process devnet ledger
//! - [`cache`] — Bounded per-round caches
//! - [`data`] — Round calculation inputs read from the index
//! - [`provider`] — Per-voter payload construction
//! - [`scheduler`] — Round phase state machine
//! - [`events`] — Round event bus
//! - [`devnet`] — Local simulated network

pub mod cache;
pub mod clock;
pub mod config;
pub mod data;
pub mod devnet;
pub mod events;
pub mod ledger;
pub mod prices;
pub mod provider;
pub mod scheduler;
pub mod submit;

/// Errors that stop a voter.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Reward epoch data could not be resolved.
    #[error("registry error: {0}")]
    Registry(#[from] ftso_registry::RegistryError),

    /// Ledger index read failed.
    #[error("index error: {0}")]
    Index(#[from] ftso_index::IndexError),

    /// Round calculation failed.
    #[error("calculation error: {0}")]
    Calc(#[from] ftso_calc::CalcError),

    /// Signing or calldata encoding failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] ftso_crypto::CryptoError),

    /// Result signing or finalizer selection failed.
    #[error("finalization error: {0}")]
    Finalize(#[from] ftso_finalize::FinalizeError),

    /// A transaction could not be sent.
    #[error("submission failed: {0}")]
    Submission(String),
}

/// Convenience result type for the daemon.
pub type Result<T> = std::result::Result<T, DaemonError>;
