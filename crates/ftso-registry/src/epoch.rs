//! Resolved registration data of one reward epoch.

use alloy_primitives::Address;
use ftso_types::voting::{CommunityOffer, InflationOffer, SigningPolicy, VoterRegistration};
use ftso_types::{Feed, RewardEpochId, Weight};

use crate::feeds::canonical_feed_order;
use crate::{RegistryError, Result};

/// Signing policy, registrations and feed order of a reward epoch.
///
/// `registrations[i]` belongs to `signing_policy.voters[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardEpoch {
    /// Reward epoch id.
    pub reward_epoch_id: RewardEpochId,
    /// Signer set of the epoch.
    pub signing_policy: SigningPolicy,
    /// Voter registrations in signing policy order.
    pub registrations: Vec<VoterRegistration>,
    /// Canonical feed order.
    pub canonical_feed_order: Vec<Feed>,
}

impl RewardEpoch {
    /// Assemble a reward epoch, matching registrations to policy voters by
    /// signing address.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::RegistrationMismatch`] if the policy arrays are not
    ///   parallel, a policy voter has no registration or more than one, or a
    ///   registration has no policy voter
    pub fn new(
        signing_policy: SigningPolicy,
        registrations: Vec<VoterRegistration>,
        inflation_offers: &[InflationOffer],
        community_offers: &[CommunityOffer],
    ) -> Result<Self> {
        let reward_epoch_id = signing_policy.reward_epoch_id;
        let mismatch = |reason: String| RegistryError::RegistrationMismatch {
            reward_epoch_id,
            reason,
        };

        if signing_policy.voters.len() != signing_policy.weights.len() {
            return Err(mismatch(format!(
                "{} policy voters but {} weights",
                signing_policy.voters.len(),
                signing_policy.weights.len()
            )));
        }
        if registrations.len() != signing_policy.voters.len() {
            return Err(mismatch(format!(
                "{} registrations for {} policy voters",
                registrations.len(),
                signing_policy.voters.len()
            )));
        }

        let mut ordered = Vec::with_capacity(registrations.len());
        for signer in &signing_policy.voters {
            let mut matching = registrations.iter().filter(|r| r.signing_address == *signer);
            let registration = matching
                .next()
                .ok_or_else(|| mismatch(format!("no registration for signer {signer}")))?;
            if matching.next().is_some() {
                return Err(mismatch(format!("duplicate registration for signer {signer}")));
            }
            ordered.push(registration.clone());
        }

        Ok(Self {
            reward_epoch_id,
            canonical_feed_order: canonical_feed_order(inflation_offers, community_offers),
            signing_policy,
            registrations: ordered,
        })
    }

    /// Signing weight of a signing address (0 if unknown).
    pub fn signing_weight(&self, signing_address: &Address) -> u16 {
        self.signing_policy.weight_of(signing_address)
    }

    /// Median-voting weight of a submit address (0 if unknown).
    pub fn median_voting_weight(&self, submit_address: &Address) -> Weight {
        self.registrations
            .iter()
            .find(|r| r.submit_address == *submit_address)
            .map_or(0, |r| r.wnat_capped_weight)
    }

    /// Delegation (entity) address of a signing address.
    pub fn delegation_address(&self, signing_address: &Address) -> Option<Address> {
        self.registrations
            .iter()
            .find(|r| r.signing_address == *signing_address)
            .map(|r| r.voter)
    }

    /// Registration owning a submit address.
    pub fn registration_by_submit(&self, submit_address: &Address) -> Option<&VoterRegistration> {
        self.registrations
            .iter()
            .find(|r| r.submit_address == *submit_address)
    }

    /// Submit addresses in registration order.
    pub fn submit_addresses(&self) -> Vec<Address> {
        self.registrations.iter().map(|r| r.submit_address).collect()
    }

    /// Median-voting weights in registration order.
    pub fn median_voting_weights(&self) -> Vec<Weight> {
        self.registrations.iter().map(|r| r.wnat_capped_weight).collect()
    }

    /// Signing addresses and their weights as selection weights.
    pub fn signing_weights(&self) -> (Vec<Address>, Vec<Weight>) {
        (
            self.signing_policy.voters.clone(),
            self.signing_policy.weights.iter().map(|w| Weight::from(*w)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    fn registration(n: u8, weight: Weight) -> VoterRegistration {
        VoterRegistration {
            reward_epoch_id: 4,
            voter: Address::repeat_byte(n),
            signing_address: Address::repeat_byte(n + 100),
            submit_address: Address::repeat_byte(n + 50),
            submit_signatures_address: Address::repeat_byte(n + 150),
            registration_weight: weight,
            wnat_weight: weight * 2,
            wnat_capped_weight: weight,
        }
    }

    fn policy(signers: &[u8]) -> SigningPolicy {
        SigningPolicy {
            reward_epoch_id: 4,
            start_voting_round_id: 400,
            threshold: 30,
            seed: U256::from(1u64),
            voters: signers.iter().map(|n| Address::repeat_byte(n + 100)).collect(),
            weights: signers.iter().map(|n| u16::from(*n) * 10).collect(),
        }
    }

    #[test]
    fn test_registrations_follow_policy_order() {
        let epoch = RewardEpoch::new(
            policy(&[2, 1]),
            vec![registration(1, 1_000), registration(2, 3_000)],
            &[],
            &[],
        )
        .expect("epoch");
        assert_eq!(epoch.registrations[0].voter, Address::repeat_byte(2));
        assert_eq!(epoch.submit_addresses(), vec![Address::repeat_byte(52), Address::repeat_byte(51)]);
        assert_eq!(epoch.median_voting_weights(), vec![3_000, 1_000]);
    }

    #[test]
    fn test_lookups() {
        let epoch = RewardEpoch::new(
            policy(&[1, 2]),
            vec![registration(1, 1_000), registration(2, 3_000)],
            &[],
            &[],
        )
        .expect("epoch");
        assert_eq!(epoch.signing_weight(&Address::repeat_byte(102)), 20);
        assert_eq!(epoch.signing_weight(&Address::repeat_byte(9)), 0);
        assert_eq!(epoch.median_voting_weight(&Address::repeat_byte(51)), 1_000);
        assert_eq!(epoch.median_voting_weight(&Address::repeat_byte(9)), 0);
        assert_eq!(
            epoch.delegation_address(&Address::repeat_byte(101)),
            Some(Address::repeat_byte(1))
        );
        assert!(epoch.registration_by_submit(&Address::repeat_byte(52)).is_some());
    }

    #[test]
    fn test_missing_registration_is_mismatch() {
        let err = RewardEpoch::new(policy(&[1, 2]), vec![registration(1, 1), registration(3, 1)], &[], &[])
            .expect_err("should fail");
        assert!(matches!(err, RegistryError::RegistrationMismatch { reward_epoch_id: 4, .. }));
    }

    #[test]
    fn test_count_mismatch() {
        let err = RewardEpoch::new(policy(&[1, 2]), vec![registration(1, 1)], &[], &[]).expect_err("should fail");
        assert!(matches!(err, RegistryError::RegistrationMismatch { .. }));
    }

    #[test]
    fn test_duplicate_registration_is_mismatch() {
        let err = RewardEpoch::new(policy(&[1, 2]), vec![registration(1, 1), registration(1, 2)], &[], &[])
            .expect_err("should fail");
        assert!(matches!(err, RegistryError::RegistrationMismatch { .. }));
    }
}
