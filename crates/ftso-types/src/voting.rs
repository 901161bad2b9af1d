//! Reward-epoch registration data and per-round submission payloads.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{Feed, RewardEpochId, VotingRoundId, Weight};

/// Canonical signer set of a reward epoch.
///
/// `voters` holds the signing addresses in canonical order and `weights`
/// their normalized signing weights. Both arrays are parallel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPolicy {
    /// Reward epoch this policy belongs to.
    pub reward_epoch_id: RewardEpochId,
    /// First voting round the policy is valid for.
    pub start_voting_round_id: VotingRoundId,
    /// Weight that must be strictly exceeded to finalize.
    pub threshold: u16,
    /// Random seed of the reward epoch.
    pub seed: U256,
    /// Signing addresses in canonical order.
    pub voters: Vec<Address>,
    /// Normalized signing weights, parallel to `voters`.
    pub weights: Vec<u16>,
}

impl SigningPolicy {
    /// Sum of all signing weights.
    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|w| u64::from(*w)).sum()
    }

    /// Signing weight of a signing address (0 if not part of the policy).
    pub fn weight_of(&self, signing_address: &Address) -> u16 {
        self.voters
            .iter()
            .position(|v| v == signing_address)
            .and_then(|i| self.weights.get(i).copied())
            .unwrap_or(0)
    }
}

/// A voter's registration for one reward epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRegistration {
    /// Reward epoch the registration applies to.
    pub reward_epoch_id: RewardEpochId,
    /// Entity (delegation) address of the voter.
    pub voter: Address,
    /// Address that signs round results.
    pub signing_address: Address,
    /// Address that submits commits and reveals.
    pub submit_address: Address,
    /// Address that submits result signatures.
    pub submit_signatures_address: Address,
    /// Registration weight.
    pub registration_weight: Weight,
    /// Uncapped delegated weight.
    pub wnat_weight: Weight,
    /// Capped delegated weight, used as the median-voting weight.
    pub wnat_capped_weight: Weight,
}

/// Inflation reward offer: a set of feeds that always get rewarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InflationOffer {
    /// Reward epoch of the offer.
    pub reward_epoch_id: RewardEpochId,
    /// Feeds covered by the offer.
    pub feeds: Vec<Feed>,
    /// Offered amount.
    pub amount: u128,
}

/// Community reward offer for a single feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityOffer {
    /// Reward epoch of the offer.
    pub reward_epoch_id: RewardEpochId,
    /// Feed covered by the offer.
    pub feed: Feed,
    /// Offered amount.
    pub amount: u128,
    /// Address that made the offer.
    pub offerer: Address,
}

/// Data revealed by a voter after the commit window closes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealData {
    /// Voter-chosen random contribution.
    pub random: B256,
    /// Packed feed values.
    #[serde(with = "hex_bytes")]
    pub encoded_values: Vec<u8>,
}

/// Recoverable ECDSA signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EcdsaSignature {
    /// Recovery byte (27 or 28).
    pub v: u8,
    /// `r` scalar.
    pub r: B256,
    /// `s` scalar.
    pub s: B256,
}

/// One signer's attestation of a claimed Merkle root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureData {
    /// Voting round the root belongs to.
    pub epoch_id: VotingRoundId,
    /// Claimed Merkle root.
    pub merkle_root: B256,
    /// Signature over the result message.
    pub signature: EcdsaSignature,
}

/// Payload submitted once enough signing weight backs a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeData {
    /// Voting round being finalized.
    pub epoch_id: VotingRoundId,
    /// Finalized Merkle root.
    pub merkle_root: B256,
    /// Signatures backing the root.
    pub signatures: Vec<EcdsaSignature>,
}

/// Hex (de)serialization for raw byte vectors.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as a `0x`-prefixed hex string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    /// Deserialize bytes from an optionally prefixed hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(crate::strip_hex_prefix(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SigningPolicy {
        SigningPolicy {
            reward_epoch_id: 3,
            start_voting_round_id: 300,
            threshold: 100,
            seed: U256::from(42u64),
            voters: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            weights: vec![60, 90],
        }
    }

    #[test]
    fn test_policy_total_weight() {
        assert_eq!(policy().total_weight(), 150);
    }

    #[test]
    fn test_policy_weight_of() {
        let p = policy();
        assert_eq!(p.weight_of(&Address::repeat_byte(2)), 90);
        assert_eq!(p.weight_of(&Address::repeat_byte(9)), 0);
    }

    #[test]
    fn test_reveal_data_serde() {
        let reveal = RevealData {
            random: B256::repeat_byte(0xab),
            encoded_values: vec![0x80, 0, 0, 1],
        };
        let json = serde_json::to_value(&reveal).expect("serialize");
        assert_eq!(json["encoded_values"], "0x80000001");
        let back: RevealData = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, reveal);
    }
}
