//! Choice of the voters that finalize a round immediately.
//!
//! A small weighted random subset of the signing policy is expected to
//! submit `finalize` as soon as the threshold is reached. Everyone else
//! waits for a grace period first, so a round still finalizes when all
//! chosen finalizers are offline.

use alloy_primitives::{Address, U256};
use ftso_calc::selection::WeightedSelector;
use ftso_crypto::abi::{encode, Token};
use ftso_crypto::hash::keccak256;
use ftso_types::voting::SigningPolicy;
use ftso_types::{VotingRoundId, Weight};

use crate::Result;

/// Share of signing weight selected as immediate finalizers.
pub const FINALIZATION_BIPS: u64 = 500;

/// Selection seed of a round.
///
/// `keccak256(abi.encode(uint256 policySeed, uint8 protocolId, uint32 round))`
pub fn finalization_seed(policy_seed: U256, protocol_id: u8, voting_round_id: VotingRoundId) -> U256 {
    let hash = keccak256(encode(&[
        Token::Uint(policy_seed),
        Token::Uint(U256::from(protocol_id)),
        Token::Uint(U256::from(voting_round_id)),
    ]));
    U256::from_be_bytes(hash.0)
}

/// Signing addresses selected to finalize a round without delay.
///
/// # Errors
///
/// - [`crate::FinalizeError::Selection`] if the policy has no signing weight
pub fn eligible_finalizers(
    policy: &SigningPolicy,
    protocol_id: u8,
    voting_round_id: VotingRoundId,
) -> Result<Vec<Address>> {
    let selector = WeightedSelector::new(
        policy.voters.clone(),
        policy.weights.iter().map(|w| Weight::from(*w)).collect(),
    )?;
    let seed = finalization_seed(policy.seed, protocol_id, voting_round_id);
    Ok(selector.random_select_threshold_weight_voters(seed, FINALIZATION_BIPS)?)
}

/// Whether `signing_address` is an immediate finalizer of the round.
///
/// # Errors
///
/// - [`crate::FinalizeError::Selection`] if the policy has no signing weight
pub fn is_eligible_finalizer(
    policy: &SigningPolicy,
    protocol_id: u8,
    voting_round_id: VotingRoundId,
    signing_address: &Address,
) -> Result<bool> {
    Ok(eligible_finalizers(policy, protocol_id, voting_round_id)?.contains(signing_address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(weights: &[u16]) -> SigningPolicy {
        SigningPolicy {
            reward_epoch_id: 1,
            start_voting_round_id: 0,
            threshold: 0,
            seed: U256::from(12_345u64),
            voters: (0..weights.len()).map(|i| Address::repeat_byte(i as u8 + 1)).collect(),
            weights: weights.to_vec(),
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let p = policy(&[100; 10]);
        let a = eligible_finalizers(&p, 100, 55).expect("select");
        let b = eligible_finalizers(&p, 100, 55).expect("select");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_selected_weight_exceeds_share() {
        let p = policy(&[100; 10]);
        let selected = eligible_finalizers(&p, 100, 3).expect("select");
        // 5% of 1000 is 50: a single voter of weight 100 suffices
        assert_eq!(selected.len(), 1);
        assert!(is_eligible_finalizer(&p, 100, 3, &selected[0]).expect("check"));
    }

    #[test]
    fn test_seed_depends_on_round_and_protocol() {
        let seed = U256::from(1u64);
        assert_ne!(finalization_seed(seed, 100, 1), finalization_seed(seed, 100, 2));
        assert_ne!(finalization_seed(seed, 100, 1), finalization_seed(seed, 101, 1));
    }

    #[test]
    fn test_zero_weight_policy_rejected() {
        assert!(eligible_finalizers(&policy(&[0, 0]), 100, 1).is_err());
    }
}
