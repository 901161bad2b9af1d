//! # ftso-crypto
//!
//! Cryptographic primitives and wire encodings for the FTSO protocol.
//!
//! Every voter must produce bit-identical hashes for commits, Merkle leaves
//! and result messages, so the suite is fixed: Keccak-256 hashing, Solidity
//! ABI tuple encoding and secp256k1 recoverable signatures.
//!
//! ## Modules
//!
//! - [`hash`] — Keccak-256 helpers, selectors and personal-message digests
//! - [`abi`] — Solidity ABI tuple encoding
//! - [`merkle`] — Commutative-pair Merkle tree with inclusion proofs
//! - [`ecdsa`] — secp256k1 signing and signer recovery
//! - [`commit`] — Commit hash of a voter's reveal data
//! - [`calldata`] — Selector registry and submission calldata codec

pub mod abi;
pub mod calldata;
pub mod commit;
pub mod ecdsa;
pub mod hash;
pub mod merkle;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The Merkle tree has no leaves.
    #[error("merkle tree is empty")]
    EmptyTree,

    /// Signature creation or recovery failed.
    #[error("signature error: {0}")]
    Signature(String),

    /// Invalid private key material.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Calldata could not be decoded.
    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),

    /// Function name is not part of the selector registry.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
