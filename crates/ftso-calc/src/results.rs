//! Round results and their Merkle attestation.
//!
//! Leaf layout (ABI tuple encoding, then Keccak-256):
//!
//! ```text
//! random leaf: (uint32 votingRoundId, uint256 value, bool isSecure)
//! feed leaf:   (uint32 votingRoundId, bytes21 feedId, int32 value, uint16 turnoutBIPS, int8 decimals)
//! ```
//!
//! The random leaf comes first, followed by one leaf per feed in canonical
//! feed order.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, B256, U256};
use ftso_crypto::abi::{encode, Token};
use ftso_crypto::hash::keccak256;
use ftso_crypto::merkle::MerkleTree;
use ftso_types::voting::RevealData;
use ftso_types::{Feed, FeedId, ValueWithDecimals, VotingRoundId, Weight, TOTAL_BIPS};

use crate::codec::decode_values;
use crate::median::{calculate_feed_median, MedianCalculationResult};
use crate::random::{calculate_random, RandomCalculationResult};
use crate::Result;

/// Everything needed to calculate one round.
#[derive(Clone, Debug, Default)]
pub struct RoundCalculationData {
    /// Round being calculated.
    pub voting_round_id: VotingRoundId,
    /// Canonical feed order of the reward epoch.
    pub feeds: Vec<Feed>,
    /// Submit addresses of all registered voters, in registration order.
    pub voters: Vec<Address>,
    /// Median-voting weights, parallel to `voters`.
    pub weights: Vec<Weight>,
    /// Valid reveals keyed by submit address.
    pub valid_reveals: BTreeMap<Address, RevealData>,
    /// Voters that committed this round without a valid reveal.
    pub reveal_offenders: BTreeSet<Address>,
    /// Voters excluded from the random for this round.
    pub benched: BTreeSet<Address>,
}

/// Calculated result of one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochResult {
    /// Round the result belongs to.
    pub voting_round_id: VotingRoundId,
    /// One median record per feed, in canonical order.
    pub median_data: Vec<MedianCalculationResult>,
    /// Combined random.
    pub random_data: RandomCalculationResult,
    /// Merkle tree over the random leaf and the feed leaves.
    pub merkle_tree: MerkleTree,
}

impl EpochResult {
    /// Root to sign and publish.
    pub fn merkle_root(&self) -> Result<B256> {
        Ok(self.merkle_tree.root()?)
    }

    /// Median record of a feed.
    pub fn median_for_feed(&self, feed_id: &FeedId) -> Option<&MedianCalculationResult> {
        self.median_data.iter().find(|m| m.feed.id == *feed_id)
    }

    /// Inclusion proof of a feed's result leaf.
    pub fn proof_for_feed(&self, feed_id: &FeedId) -> Option<Vec<B256>> {
        let median = self.median_for_feed(feed_id)?;
        self.merkle_tree.proof(&feed_result_leaf(median))
    }

    /// Inclusion proof of the random leaf.
    pub fn proof_for_random(&self) -> Option<Vec<B256>> {
        self.merkle_tree.proof(&random_result_leaf(&self.random_data))
    }
}

/// Share of the total voting weight that participated, in basis points.
///
/// Returns 0 when the total is 0.
pub fn turnout_bips(participating: Weight, total: Weight) -> u16 {
    if total == 0 {
        return 0;
    }
    let bips = U256::from(participating.min(total)) * U256::from(TOTAL_BIPS) / U256::from(total);
    // bounded by TOTAL_BIPS
    bips.as_limbs()[0] as u16
}

/// Leaf hash of a feed result.
pub fn feed_result_leaf(median: &MedianCalculationResult) -> B256 {
    let value: &ValueWithDecimals = &median.data.final_median;
    let turnout = turnout_bips(median.data.participating_weight, median.total_voting_weight);
    keccak256(encode(&[
        Token::Uint(U256::from(median.voting_round_id)),
        Token::FixedBytes(median.feed.id.as_bytes().to_vec()),
        Token::Int(i128::from(value.value)),
        Token::Uint(U256::from(turnout)),
        Token::Int(i128::from(median.feed.decimals)),
    ]))
}

/// Leaf hash of a random result.
pub fn random_result_leaf(random: &RandomCalculationResult) -> B256 {
    keccak256(encode(&[
        Token::Uint(U256::from(random.voting_round_id)),
        Token::Uint(random.random),
        Token::Bool(random.is_secure),
    ]))
}

/// Calculate medians, the random and the Merkle tree of a round.
///
/// Voters without a valid reveal, or whose reveal does not decode against
/// the feed order, contribute empty values.
///
/// # Errors
///
/// - [`crate::CalcError::NoValidReveals`] if nobody revealed validly
pub fn calculate_results_for_voting_round(data: &RoundCalculationData) -> Result<EpochResult> {
    let random_data = calculate_random(
        data.voting_round_id,
        &data.valid_reveals,
        &data.reveal_offenders,
        &data.benched,
    )?;

    let empty_row: Vec<ValueWithDecimals> = data
        .feeds
        .iter()
        .map(|f| ValueWithDecimals::empty(f.decimals))
        .collect();

    let rows: Vec<Vec<ValueWithDecimals>> = data
        .voters
        .iter()
        .map(|voter| match data.valid_reveals.get(voter) {
            Some(reveal) => match decode_values(&reveal.encoded_values, &data.feeds) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(
                        voting_round = data.voting_round_id,
                        %voter,
                        error = %e,
                        "undecodable reveal treated as empty"
                    );
                    empty_row.clone()
                }
            },
            None => empty_row.clone(),
        })
        .collect();

    let median_data: Vec<MedianCalculationResult> = data
        .feeds
        .iter()
        .enumerate()
        .map(|(i, feed)| {
            let feed_values = rows.iter().map(|row| row[i]).collect();
            calculate_feed_median(
                data.voting_round_id,
                *feed,
                data.voters.clone(),
                feed_values,
                data.weights.clone(),
            )
        })
        .collect();

    let mut leaves = Vec::with_capacity(median_data.len() + 1);
    leaves.push(random_result_leaf(&random_data));
    leaves.extend(median_data.iter().map(feed_result_leaf));
    let merkle_tree = MerkleTree::new(leaves);

    tracing::debug!(
        voting_round = data.voting_round_id,
        feeds = median_data.len(),
        valid_reveals = data.valid_reveals.len(),
        "round results calculated"
    );

    Ok(EpochResult {
        voting_round_id: data.voting_round_id,
        median_data,
        random_data,
        merkle_tree,
    })
}

#[cfg(test)]
mod tests {
    use ftso_crypto::merkle::verify_proof;
    use ftso_types::feed::CATEGORY_CRYPTO;

    use super::*;
    use crate::codec::encode_values;
    use crate::CalcError;

    fn feeds() -> Vec<Feed> {
        vec![
            Feed::new(FeedId::from_name(CATEGORY_CRYPTO, "BTC/USD"), 2),
            Feed::new(FeedId::from_name(CATEGORY_CRYPTO, "ETH/USD"), 3),
        ]
    }

    fn round_data(prices: &[[f64; 2]]) -> RoundCalculationData {
        let f = feeds();
        let voters: Vec<Address> = (1..=prices.len() as u8).map(Address::repeat_byte).collect();
        let valid_reveals = voters
            .iter()
            .zip(prices)
            .map(|(voter, p)| {
                let encoded = encode_values(&[Some(p[0]), Some(p[1])], &f).expect("encode");
                (
                    *voter,
                    RevealData {
                        random: B256::repeat_byte(voter.0[0]),
                        encoded_values: encoded,
                    },
                )
            })
            .collect();
        RoundCalculationData {
            voting_round_id: 11,
            feeds: f,
            weights: vec![100; voters.len()],
            voters,
            valid_reveals,
            ..Default::default()
        }
    }

    #[test]
    fn test_turnout_bips() {
        assert_eq!(turnout_bips(0, 0), 0);
        assert_eq!(turnout_bips(5, 10), 5_000);
        assert_eq!(turnout_bips(1, 3), 3_333);
        assert_eq!(turnout_bips(u128::MAX, u128::MAX), 10_000);
    }

    #[test]
    fn test_results_and_proofs() {
        let data = round_data(&[[100.0, 2.0], [101.0, 2.5], [102.0, 3.0]]);
        let result = calculate_results_for_voting_round(&data).expect("results");
        let root = result.merkle_root().expect("root");

        let btc = result.median_for_feed(&feeds()[0].id).expect("btc");
        assert_eq!(btc.data.final_median, ValueWithDecimals::new(10_100, 2));
        let eth = result.median_for_feed(&feeds()[1].id).expect("eth");
        assert_eq!(eth.data.final_median, ValueWithDecimals::new(2_500, 3));
        assert!(result.random_data.is_secure);

        for feed in feeds() {
            let median = result.median_for_feed(&feed.id).expect("median");
            let proof = result.proof_for_feed(&feed.id).expect("proof");
            assert!(verify_proof(&feed_result_leaf(median), &proof, &root));
        }
        let proof = result.proof_for_random().expect("random proof");
        assert!(verify_proof(&random_result_leaf(&result.random_data), &proof, &root));
        assert_eq!(result.merkle_tree.leaves()[0], random_result_leaf(&result.random_data));
    }

    #[test]
    fn test_missing_reveal_lowers_turnout() {
        let mut data = round_data(&[[100.0, 2.0], [101.0, 2.5]]);
        data.voters.push(Address::repeat_byte(9));
        data.weights.push(200);
        let result = calculate_results_for_voting_round(&data).expect("results");
        let median = &result.median_data[0];
        assert_eq!(median.total_voting_weight, 400);
        assert_eq!(median.data.participating_weight, 200);
        assert!(median.feed_values[2].is_empty);
    }

    #[test]
    fn test_undecodable_reveal_is_empty() {
        let mut data = round_data(&[[100.0, 2.0], [101.0, 2.5]]);
        if let Some(reveal) = data.valid_reveals.get_mut(&Address::repeat_byte(2)) {
            reveal.encoded_values = vec![1, 2, 3];
        }
        let result = calculate_results_for_voting_round(&data).expect("results");
        assert_eq!(result.median_data[0].data.participating_weight, 100);
        assert_eq!(
            result.median_data[0].data.final_median,
            ValueWithDecimals::new(10_000, 2)
        );
    }

    #[test]
    fn test_no_reveals() {
        let mut data = round_data(&[[1.0, 1.0]]);
        data.valid_reveals.clear();
        assert!(matches!(
            calculate_results_for_voting_round(&data),
            Err(CalcError::NoValidReveals(11))
        ));
    }

    #[test]
    fn test_identical_inputs_identical_roots() {
        let a = calculate_results_for_voting_round(&round_data(&[[1.0, 2.0], [3.0, 4.0]]))
            .expect("a");
        let b = calculate_results_for_voting_round(&round_data(&[[1.0, 2.0], [3.0, 4.0]]))
            .expect("b");
        assert_eq!(a.merkle_root().expect("a"), b.merkle_root().expect("b"));
        let c = calculate_results_for_voting_round(&round_data(&[[1.0, 2.0], [3.0, 4.01]]))
            .expect("c");
        assert_ne!(a.merkle_root().expect("a"), c.merkle_root().expect("c"));
    }
}
