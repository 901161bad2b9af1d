//! Weighted random voter selection.
//!
//! Voters occupy consecutive half-open intervals `[thresholds[i],
//! thresholds[i] + weights[i])` of `[0, total)`. A seed reduced modulo the
//! total lands in exactly one interval; zero-weight voters own an empty
//! interval and are never picked.

use alloy_primitives::{Address, U256};
use ftso_crypto::hash::keccak256;
use ftso_types::{Weight, TOTAL_BIPS};

use crate::{CalcError, Result};

/// Largest selection threshold accepted, in basis points.
pub const MAX_THRESHOLD_BIPS: u64 = 5_000;

/// Voters with cumulative weight thresholds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedSelector {
    voters: Vec<Address>,
    weights: Vec<Weight>,
    thresholds: Vec<Weight>,
    total_weight: Weight,
}

impl WeightedSelector {
    /// Build a selector over parallel voter and weight lists.
    ///
    /// # Errors
    ///
    /// - [`CalcError::EmptyVoterSet`] if the lists differ in length or the
    ///   total weight is zero
    pub fn new(voters: Vec<Address>, weights: Vec<Weight>) -> Result<Self> {
        if voters.len() != weights.len() {
            return Err(CalcError::EmptyVoterSet);
        }

        let mut thresholds = Vec::with_capacity(weights.len());
        let mut total_weight: Weight = 0;
        for weight in &weights {
            thresholds.push(total_weight);
            total_weight = total_weight.saturating_add(*weight);
        }
        if total_weight == 0 {
            return Err(CalcError::EmptyVoterSet);
        }

        Ok(Self {
            voters,
            weights,
            thresholds,
            total_weight,
        })
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Voters in selection order.
    pub fn voters(&self) -> &[Address] {
        &self.voters
    }

    /// Index of the voter whose interval contains `seed mod total`.
    pub fn select_voter_index(&self, seed: &U256) -> usize {
        let reduced = *seed % U256::from(self.total_weight);
        // reduced < total_weight <= u128::MAX
        let limbs = reduced.as_limbs();
        let point = u128::from(limbs[0]) | (u128::from(limbs[1]) << 64);
        self.thresholds
            .partition_point(|t| *t <= point)
            .saturating_sub(1)
    }

    /// Select distinct voters until their combined weight strictly exceeds
    /// `threshold_bips` of the total.
    ///
    /// The seed is re-hashed after every draw, so the selection is a pure
    /// function of the initial seed.
    ///
    /// # Errors
    ///
    /// - [`CalcError::InvalidThreshold`] if `threshold_bips` exceeds
    ///   [`MAX_THRESHOLD_BIPS`]
    pub fn random_select_threshold_weight_voters(
        &self,
        seed: U256,
        threshold_bips: u64,
    ) -> Result<Vec<Address>> {
        if threshold_bips > MAX_THRESHOLD_BIPS {
            return Err(CalcError::InvalidThreshold(threshold_bips));
        }

        let target = self.total_weight / Weight::from(TOTAL_BIPS) * Weight::from(threshold_bips)
            + self.total_weight % Weight::from(TOTAL_BIPS) * Weight::from(threshold_bips)
                / Weight::from(TOTAL_BIPS);

        let mut selected = vec![false; self.voters.len()];
        let mut result = Vec::new();
        let mut accumulated: Weight = 0;
        let mut current = seed;

        while accumulated <= target {
            let index = self.select_voter_index(&current);
            if !selected[index] {
                selected[index] = true;
                accumulated += self.weights[index];
                result.push(self.voters[index]);
            }
            current = U256::from_be_bytes(keccak256(current.to_be_bytes::<32>()).0);
        }

        Ok(result)
    }
}

/// Convenience wrapper: select from parallel lists in one call.
///
/// # Errors
///
/// - [`CalcError::EmptyVoterSet`] for an empty, zero-weight or mismatched set
/// - [`CalcError::InvalidThreshold`] if `threshold_bips` exceeds
///   [`MAX_THRESHOLD_BIPS`]
pub fn random_select_threshold_weight_voters(
    voters: Vec<Address>,
    weights: Vec<Weight>,
    seed: U256,
    threshold_bips: u64,
) -> Result<Vec<Address>> {
    WeightedSelector::new(voters, weights)?.random_select_threshold_weight_voters(seed, threshold_bips)
}
