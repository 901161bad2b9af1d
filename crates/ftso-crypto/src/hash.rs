//! Keccak-256 hashing.
//!
//! All protocol hashes are plain Keccak-256 (the Ethereum variant, not
//! NIST SHA3-256). Signed result messages use the Ethereum personal-message
//! envelope so that standard wallets and on-chain `ecrecover` agree.

use alloy_primitives::B256;

/// Prefix of an Ethereum personal message carrying a 32-byte payload.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Keccak-256 of the input.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    alloy_primitives::keccak256(data)
}

/// Keccak-256 of the concatenation of several byte slices.
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut buf = Vec::with_capacity(total);
    for part in parts {
        buf.extend_from_slice(part);
    }
    keccak256(&buf)
}

/// 4-byte function selector of a Solidity function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Digest actually signed for a 32-byte message hash.
///
/// `keccak256("\x19Ethereum Signed Message:\n32" || message_hash)`
pub fn personal_message_hash(message_hash: &B256) -> B256 {
    keccak256_concat(&[PERSONAL_MESSAGE_PREFIX, message_hash.as_slice()])
}
