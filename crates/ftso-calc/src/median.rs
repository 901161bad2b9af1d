//! Weighted median and quartiles.
//!
//! Non-empty values are sorted ascending (stably, so equal values keep voter
//! order) and walked with a running weight sum:
//!
//! - median: first value whose cumulative weight reaches `ceil(total / 2)`;
//!   if it lands exactly on that boundary and `total` is even, the floor
//!   mean of that value and the next one
//! - first quartile: first value whose cumulative weight exceeds
//!   `floor(total / 4)`, walking up from the lowest value
//! - third quartile: same, walking down from the highest value
//!
//! Empty values and their weights take no part in any sum.

use alloy_primitives::Address;
use ftso_types::{Feed, ValueWithDecimals, VotingRoundId, Weight};
use serde::{Deserialize, Serialize};

/// Median and quartiles of one feed in one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedianCalculationSummary {
    /// Weighted median.
    pub final_median: ValueWithDecimals,
    /// First quartile.
    pub quartile1: ValueWithDecimals,
    /// Third quartile.
    pub quartile3: ValueWithDecimals,
    /// Sum of the weights of voters with a non-empty value.
    pub participating_weight: Weight,
}

impl MedianCalculationSummary {
    /// Summary for a feed nobody submitted a value for.
    pub fn empty(decimals: i8) -> Self {
        Self {
            final_median: ValueWithDecimals::empty(decimals),
            quartile1: ValueWithDecimals::empty(decimals),
            quartile3: ValueWithDecimals::empty(decimals),
            participating_weight: 0,
        }
    }
}

/// Full median record of one feed: inputs plus summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedianCalculationResult {
    /// Voting round.
    pub voting_round_id: VotingRoundId,
    /// Feed the values belong to.
    pub feed: Feed,
    /// Submit addresses of all registered voters.
    pub voters: Vec<Address>,
    /// Each voter's value, parallel to `voters`.
    pub feed_values: Vec<ValueWithDecimals>,
    /// Each voter's median-voting weight, parallel to `voters`.
    pub weights: Vec<Weight>,
    /// Median summary.
    pub data: MedianCalculationSummary,
    /// Sum of all voters' weights, empty or not.
    pub total_voting_weight: Weight,
}

/// Weighted median and quartiles of parallel value/weight slices.
///
/// Slices of unequal length are truncated to the shorter one.
pub fn calculate_median(
    values: &[ValueWithDecimals],
    weights: &[Weight],
    decimals: i8,
) -> MedianCalculationSummary {
    let mut entries: Vec<(i32, Weight)> = values
        .iter()
        .zip(weights)
        .filter(|(v, _)| !v.is_empty)
        .map(|(v, w)| (v.value, *w))
        .collect();
    entries.sort_by_key(|(value, _)| *value);

    let total: Weight = entries.iter().map(|(_, w)| *w).sum();
    if entries.is_empty() || total == 0 {
        return MedianCalculationSummary::empty(decimals);
    }

    let median_weight = total.div_ceil(2);
    let mut median = entries[entries.len() - 1].0;
    let mut cumulative: Weight = 0;
    for (i, (value, weight)) in entries.iter().enumerate() {
        cumulative += weight;
        if cumulative >= median_weight {
            median = match entries.get(i + 1) {
                Some((next, _)) if cumulative == median_weight && total % 2 == 0 => {
                    (i64::from(*value) + i64::from(*next)).div_euclid(2) as i32
                }
                _ => *value,
            };
            break;
        }
    }

    let quartile_weight = total / 4;
    let quartile1 = first_exceeding(entries.iter(), quartile_weight);
    let quartile3 = first_exceeding(entries.iter().rev(), quartile_weight);

    MedianCalculationSummary {
        final_median: ValueWithDecimals::new(median, decimals),
        quartile1: ValueWithDecimals::new(quartile1, decimals),
        quartile3: ValueWithDecimals::new(quartile3, decimals),
        participating_weight: total,
    }
}

fn first_exceeding<'a>(entries: impl Iterator<Item = &'a (i32, Weight)>, bound: Weight) -> i32 {
    let mut cumulative: Weight = 0;
    let mut last = 0;
    for (value, weight) in entries {
        cumulative += weight;
        last = *value;
        if cumulative > bound {
            break;
        }
    }
    last
}

/// Build the median record of one feed.
pub fn calculate_feed_median(
    voting_round_id: VotingRoundId,
    feed: Feed,
    voters: Vec<Address>,
    feed_values: Vec<ValueWithDecimals>,
    weights: Vec<Weight>,
) -> MedianCalculationResult {
    let data = calculate_median(&feed_values, &weights, feed.decimals);
    let total_voting_weight = weights.iter().sum();
    MedianCalculationResult {
        voting_round_id,
        feed,
        voters,
        feed_values,
        weights,
        data,
        total_voting_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[i32]) -> Vec<ValueWithDecimals> {
        raw.iter().map(|v| ValueWithDecimals::new(*v, 2)).collect()
    }

    #[test]
    fn test_median_of_1_to_99() {
        let raw: Vec<i32> = (1..=99).rev().collect();
        let summary = calculate_median(&values(&raw), &vec![1; 99], 2);
        assert_eq!(summary.final_median.value, 50);
        assert_eq!(summary.quartile1.value, 25);
        assert_eq!(summary.quartile3.value, 75);
        assert_eq!(summary.participating_weight, 99);
    }

    #[test]
    fn test_even_tie_takes_mean() {
        let summary = calculate_median(&values(&[4, 2]), &[1, 1], 2);
        assert_eq!(summary.final_median.value, 3);
        assert_eq!(summary.quartile1.value, 2);
        assert_eq!(summary.quartile3.value, 4);
        assert_eq!(summary.participating_weight, 2);
    }

    #[test]
    fn test_mean_floors_negative() {
        let summary = calculate_median(&values(&[-3, 0]), &[1, 1], 2);
        assert_eq!(summary.final_median.value, -2);
    }

    #[test]
    fn test_weight_dominates() {
        let summary = calculate_median(&values(&[1, 2, 3]), &[1, 1, 10], 2);
        assert_eq!(summary.final_median.value, 3);
        assert_eq!(summary.quartile1.value, 3);
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut v = values(&[10, 20, 30]);
        v.push(ValueWithDecimals::empty(2));
        let summary = calculate_median(&v, &[1, 1, 1, 100], 2);
        assert_eq!(summary.final_median.value, 20);
        assert_eq!(summary.participating_weight, 3);
    }

    #[test]
    fn test_all_empty() {
        let v = vec![ValueWithDecimals::empty(3); 4];
        let summary = calculate_median(&v, &[1, 2, 3, 4], 3);
        assert_eq!(summary, MedianCalculationSummary::empty(3));
    }

    #[test]
    fn test_single_value() {
        let summary = calculate_median(&values(&[42]), &[5], 2);
        assert_eq!(summary.final_median.value, 42);
        assert_eq!(summary.quartile1.value, 42);
        assert_eq!(summary.quartile3.value, 42);
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let summary = calculate_median(&values(&[i32::MAX, i32::MAX]), &[1, 1], 2);
        assert_eq!(summary.final_median.value, i32::MAX);
    }

    #[test]
    fn test_participating_weight_monotonic() {
        let mut v = vec![ValueWithDecimals::empty(2); 5];
        let w = vec![3u128; 5];
        let mut last = 0;
        for i in 0..5 {
            v[i] = ValueWithDecimals::new(i as i32, 2);
            let weight = calculate_median(&v, &w, 2).participating_weight;
            assert!(weight > last);
            last = weight;
        }
    }

    #[test]
    fn test_feed_median_record() {
        let feed = Feed::new(ftso_types::FeedId::from_name(1, "BTC/USD"), 2);
        let voters = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let mut v = values(&[100]);
        v.push(ValueWithDecimals::empty(2));
        let result = calculate_feed_median(5, feed, voters, v, vec![4, 6]);
        assert_eq!(result.total_voting_weight, 10);
        assert_eq!(result.data.participating_weight, 4);
        assert_eq!(result.data.final_median.value, 100);
    }
}
