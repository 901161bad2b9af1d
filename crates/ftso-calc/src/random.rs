//! Combined random value of a voting round.
//!
//! The round random is the wrapping sum (mod 2^256) of the random
//! contributions of every non-benched voter with a valid reveal. It is only
//! considered secure when no non-benched voter withheld a reveal in this
//! round and at least two non-benched voters contributed.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, U256};
use ftso_types::voting::RevealData;
use ftso_types::VotingRoundId;
use serde::{Deserialize, Serialize};

use crate::{CalcError, Result};

/// Minimum number of non-benched contributors for a secure random.
pub const MIN_SECURE_CONTRIBUTORS: usize = 2;

/// Random value of one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomCalculationResult {
    /// Voting round.
    pub voting_round_id: VotingRoundId,
    /// Combined random.
    pub random: U256,
    /// Whether the random can be relied on.
    pub is_secure: bool,
}

/// Combine the reveals of a round into its random value.
///
/// # Errors
///
/// - [`CalcError::NoValidReveals`] if `valid_reveals` is empty
pub fn calculate_random(
    voting_round_id: VotingRoundId,
    valid_reveals: &BTreeMap<Address, RevealData>,
    offenders: &BTreeSet<Address>,
    benched: &BTreeSet<Address>,
) -> Result<RandomCalculationResult> {
    if valid_reveals.is_empty() {
        return Err(CalcError::NoValidReveals(voting_round_id));
    }

    let mut random = U256::ZERO;
    let mut contributors = 0usize;
    for (voter, reveal) in valid_reveals {
        if benched.contains(voter) {
            continue;
        }
        random = random.wrapping_add(U256::from_be_bytes(reveal.random.0));
        contributors += 1;
    }

    let active_offenders = offenders.iter().filter(|o| !benched.contains(*o)).count();
    let is_secure = active_offenders == 0 && contributors >= MIN_SECURE_CONTRIBUTORS;

    tracing::debug!(
        voting_round = voting_round_id,
        contributors,
        active_offenders,
        is_secure,
        "round random calculated"
    );

    Ok(RandomCalculationResult {
        voting_round_id,
        random,
        is_secure,
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;

    fn reveal_with(random: U256) -> RevealData {
        RevealData {
            random: B256::from(random.to_be_bytes::<32>()),
            encoded_values: vec![],
        }
    }

    fn reveals(n: u8) -> BTreeMap<Address, RevealData> {
        (1..=n)
            .map(|i| (Address::repeat_byte(i), reveal_with(U256::from(i))))
            .collect()
    }

    #[test]
    fn test_sum_of_contributions() {
        let result = calculate_random(1, &reveals(3), &BTreeSet::new(), &BTreeSet::new())
            .expect("random");
        assert_eq!(result.random, U256::from(6u64));
        assert!(result.is_secure);
    }

    #[test]
    fn test_sum_wraps() {
        let mut r = BTreeMap::new();
        r.insert(Address::repeat_byte(1), reveal_with(U256::MAX));
        r.insert(Address::repeat_byte(2), reveal_with(U256::from(2u64)));
        let result = calculate_random(1, &r, &BTreeSet::new(), &BTreeSet::new()).expect("random");
        assert_eq!(result.random, U256::from(1u64));
    }

    #[test]
    fn test_no_reveals_is_error() {
        assert!(matches!(
            calculate_random(9, &BTreeMap::new(), &BTreeSet::new(), &BTreeSet::new()),
            Err(CalcError::NoValidReveals(9))
        ));
    }

    #[test]
    fn test_single_contributor_is_insecure() {
        let result = calculate_random(1, &reveals(1), &BTreeSet::new(), &BTreeSet::new())
            .expect("random");
        assert!(!result.is_secure);
    }

    #[test]
    fn test_offender_makes_insecure() {
        let offenders = BTreeSet::from([Address::repeat_byte(9)]);
        let result = calculate_random(1, &reveals(3), &offenders, &BTreeSet::new()).expect("random");
        assert!(!result.is_secure);
    }

    #[test]
    fn test_benched_offender_is_ignored() {
        let offender = Address::repeat_byte(9);
        let result = calculate_random(
            1,
            &reveals(3),
            &BTreeSet::from([offender]),
            &BTreeSet::from([offender]),
        )
        .expect("random");
        assert!(result.is_secure);
    }

    #[test]
    fn test_benched_reveal_excluded() {
        let benched = BTreeSet::from([Address::repeat_byte(3)]);
        let result = calculate_random(1, &reveals(3), &BTreeSet::new(), &benched).expect("random");
        assert_eq!(result.random, U256::from(3u64));
        assert!(result.is_secure);

        let benched = BTreeSet::from([Address::repeat_byte(2), Address::repeat_byte(3)]);
        let result = calculate_random(1, &reveals(3), &BTreeSet::new(), &benched).expect("random");
        assert!(!result.is_secure);
    }
}
