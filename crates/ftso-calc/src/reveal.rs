//! Commit/reveal matching.
//!
//! A reveal is valid when the same submit address committed in the round
//! and the commit hash recomputed from the reveal matches. Committers
//! without a valid reveal are reveal offenders, and offenders of recent
//! rounds are benched from the random value.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, B256};
use ftso_crypto::commit::reveal_commit_hash;
use ftso_types::voting::RevealData;

/// Outcome of matching a round's commits against its reveals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealSummary {
    /// Valid reveals keyed by submit address.
    pub valid: BTreeMap<Address, RevealData>,
    /// Addresses that committed but did not reveal validly.
    pub offenders: BTreeSet<Address>,
}

impl RevealSummary {
    /// Number of valid reveals.
    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }
}

/// Match commits against reveals.
///
/// `commits` and `reveals` are `(submit address, payload)` pairs in ledger
/// order. A later commit from the same address replaces an earlier one.
/// The first reveal matching the surviving commit is kept; reveals from
/// addresses without a commit are ignored.
pub fn match_reveals(
    commits: &[(Address, B256)],
    reveals: &[(Address, RevealData)],
) -> RevealSummary {
    let commits: BTreeMap<Address, B256> = commits.iter().copied().collect();

    let mut valid = BTreeMap::new();
    for (sender, reveal) in reveals {
        if valid.contains_key(sender) {
            continue;
        }
        let Some(expected) = commits.get(sender) else {
            tracing::debug!(%sender, "reveal without commit ignored");
            continue;
        };
        if reveal_commit_hash(sender, reveal) == *expected {
            valid.insert(*sender, reveal.clone());
        } else {
            tracing::debug!(%sender, "reveal does not match commit");
        }
    }

    let offenders = commits
        .keys()
        .filter(|addr| !valid.contains_key(*addr))
        .copied()
        .collect();

    RevealSummary { valid, offenders }
}

/// Voters benched for a round: the union of the offenders of the rounds in
/// the benching window preceding it.
pub fn benched_voters<'a>(
    previous_offenders: impl IntoIterator<Item = &'a BTreeSet<Address>>,
) -> BTreeSet<Address> {
    previous_offenders
        .into_iter()
        .flat_map(|set| set.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use ftso_crypto::commit::commit_hash;

    use super::*;

    fn reveal(n: u8) -> RevealData {
        RevealData {
            random: B256::repeat_byte(n),
            encoded_values: vec![0x80, 0, 0, n],
        }
    }

    fn commit(addr: Address, r: &RevealData) -> (Address, B256) {
        (addr, commit_hash(&addr, &r.random, &r.encoded_values))
    }

    #[test]
    fn test_matching_reveal_is_valid() {
        let a = Address::repeat_byte(1);
        let summary = match_reveals(&[commit(a, &reveal(1))], &[(a, reveal(1))]);
        assert_eq!(summary.valid_count(), 1);
        assert!(summary.offenders.is_empty());
    }

    #[test]
    fn test_missing_and_bad_reveals_are_offenders() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let summary = match_reveals(
            &[commit(a, &reveal(1)), commit(b, &reveal(2))],
            &[(a, reveal(9))],
        );
        assert!(summary.valid.is_empty());
        assert_eq!(summary.offenders, BTreeSet::from([a, b]));
    }

    #[test]
    fn test_reveal_without_commit_ignored() {
        let a = Address::repeat_byte(1);
        let summary = match_reveals(&[], &[(a, reveal(1))]);
        assert!(summary.valid.is_empty());
        assert!(summary.offenders.is_empty());
    }

    #[test]
    fn test_reveal_bound_to_sender() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        // b copies a's commit and reveal
        let copied = (b, commit(a, &reveal(1)).1);
        let summary = match_reveals(&[commit(a, &reveal(1)), copied], &[(a, reveal(1)), (b, reveal(1))]);
        assert!(summary.valid.contains_key(&a));
        assert!(!summary.valid.contains_key(&b));
        assert!(summary.offenders.contains(&b));
    }

    #[test]
    fn test_latest_commit_wins() {
        let a = Address::repeat_byte(1);
        let summary = match_reveals(
            &[commit(a, &reveal(1)), commit(a, &reveal(2))],
            &[(a, reveal(1)), (a, reveal(2))],
        );
        assert_eq!(summary.valid.get(&a), Some(&reveal(2)));
    }

    #[test]
    fn test_benched_is_union() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let rounds = [BTreeSet::from([a]), BTreeSet::new(), BTreeSet::from([a, b])];
        assert_eq!(benched_voters(&rounds), BTreeSet::from([a, b]));
    }
}
