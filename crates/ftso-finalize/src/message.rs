//! Result message hashing and signing.
//!
//! ```text
//! message = keccak256(abi.encode(uint32 votingRoundId, bytes32 merkleRoot))
//! digest  = keccak256("\x19Ethereum Signed Message:\n32" || message)
//! ```

use alloy_primitives::{Address, B256, U256};
use ftso_crypto::abi::{encode, Token};
use ftso_crypto::ecdsa::{recover_signer, LocalSigner};
use ftso_crypto::hash::{keccak256, personal_message_hash};
use ftso_types::voting::{EcdsaSignature, SignatureData};
use ftso_types::VotingRoundId;

use crate::Result;

/// Hash of the result message for a round and root.
pub fn result_message_hash(voting_round_id: VotingRoundId, merkle_root: &B256) -> B256 {
    keccak256(encode(&[
        Token::Uint(U256::from(voting_round_id)),
        Token::FixedBytes(merkle_root.to_vec()),
    ]))
}

/// Sign a round's Merkle root.
pub fn sign_result(
    signer: &LocalSigner,
    voting_round_id: VotingRoundId,
    merkle_root: B256,
) -> Result<SignatureData> {
    let digest = personal_message_hash(&result_message_hash(voting_round_id, &merkle_root));
    let signature = signer.sign_prehash(&digest)?;
    Ok(SignatureData {
        epoch_id: voting_round_id,
        merkle_root,
        signature,
    })
}

/// Recover the signing address of a result signature.
pub fn recover_result_signer(
    voting_round_id: VotingRoundId,
    merkle_root: &B256,
    signature: &EcdsaSignature,
) -> Result<Address> {
    let digest = personal_message_hash(&result_message_hash(voting_round_id, merkle_root));
    Ok(recover_signer(&digest, signature)?)
}
