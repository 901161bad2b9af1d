//! Commit hash of a voter's reveal data.
//!
//! ```text
//! commit = keccak256(abi.encode(address submitAddress, uint256 random, bytes encodedValues))
//! ```
//!
//! Binding the submit address prevents one voter from replaying another
//! voter's commit.

use alloy_primitives::{Address, B256, U256};
use ftso_types::voting::RevealData;

use crate::abi::{encode, Token};
use crate::hash::keccak256;

/// Commit hash for the given submit address, random and packed values.
pub fn commit_hash(submit_address: &Address, random: &B256, encoded_values: &[u8]) -> B256 {
    let encoded = encode(&[
        Token::Address(*submit_address),
        Token::Uint(U256::from_be_bytes(random.0)),
        Token::Bytes(encoded_values.to_vec()),
    ]);
    keccak256(encoded)
}

/// Commit hash of a full reveal payload.
pub fn reveal_commit_hash(submit_address: &Address, reveal: &RevealData) -> B256 {
    commit_hash(submit_address, &reveal.random, &reveal.encoded_values)
}
