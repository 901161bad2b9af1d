//! Caching reward epoch resolver.
//!
//! Resolution of reward epoch `E`:
//!
//! 1. find the `SigningPolicyInitialized` event for `E` inside its
//!    registration window; its publication closes registration
//! 2. require the index to cover the window up to that event
//! 3. read voter registrations and reward offers for `E` up to the event
//!
//! A resolved epoch is immutable and is cached. Nothing is cached while the
//! policy is missing or the range check fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use ftso_index::RangeWaiter;
use ftso_types::ledger::{event_names, ContractName, LedgerEvent};
use ftso_types::{EpochSettings, RewardEpochId, VotingRoundId};
use parking_lot::Mutex;

use crate::epoch::RewardEpoch;
use crate::{RegistryError, Result};

/// Default number of resolved reward epochs kept in memory.
pub const DEFAULT_RETAINED_EPOCHS: usize = 4;

/// Resolves and caches [`RewardEpoch`]s from the ledger index.
pub struct EpochResolver {
    waiter: RangeWaiter,
    settings: EpochSettings,
    retained: usize,
    cache: Mutex<BTreeMap<RewardEpochId, Arc<RewardEpoch>>>,
}

impl EpochResolver {
    /// Create a resolver keeping [`DEFAULT_RETAINED_EPOCHS`] epochs.
    pub fn new(waiter: RangeWaiter, settings: EpochSettings) -> Self {
        Self {
            waiter,
            settings,
            retained: DEFAULT_RETAINED_EPOCHS,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Epoch timing used by the resolver.
    pub fn settings(&self) -> &EpochSettings {
        &self.settings
    }

    /// Reward epoch a voting round belongs to.
    pub async fn reward_epoch_for_round(&self, round: VotingRoundId) -> Result<Arc<RewardEpoch>> {
        self.reward_epoch(self.settings.reward_epoch_for_round(round)).await
    }

    /// Resolve a reward epoch, from cache when possible.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::MissingSigningPolicy`] if the policy is not indexed yet
    /// - [`RegistryError::Index`] with `RangeNotIndexed` if the index has not
    ///   caught up with the policy event
    /// - [`RegistryError::RegistrationMismatch`] if registrations and policy
    ///   disagree
    pub async fn reward_epoch(&self, reward_epoch_id: RewardEpochId) -> Result<Arc<RewardEpoch>> {
        let cached = self.cache.lock().get(&reward_epoch_id).cloned();
        if let Some(epoch) = cached {
            return Ok(epoch);
        }

        let epoch = Arc::new(self.resolve(reward_epoch_id).await?);

        let mut cache = self.cache.lock();
        cache.entry(reward_epoch_id).or_insert_with(|| epoch.clone());
        while cache.len() > self.retained {
            cache.pop_first();
        }
        Ok(epoch)
    }

    async fn resolve(&self, reward_epoch_id: RewardEpochId) -> Result<RewardEpoch> {
        let reader = self.waiter.reader();
        let (start, _) = self.settings.registration_window(reward_epoch_id);

        let policy_record = reader
            .query_events(
                ContractName::SystemsManager,
                event_names::SIGNING_POLICY_INITIALIZED,
                start,
                None,
            )
            .await?
            .into_iter()
            .find_map(|record| match record.event {
                LedgerEvent::SigningPolicyInitialized(policy)
                    if policy.reward_epoch_id == reward_epoch_id =>
                {
                    Some((record.timestamp, policy))
                }
                _ => None,
            });
        let Some((policy_ts, policy)) = policy_record else {
            return Err(RegistryError::MissingSigningPolicy(reward_epoch_id));
        };

        self.waiter.require_range(start, policy_ts).await?;

        let registrations = reader
            .query_events(
                ContractName::VoterRegistry,
                event_names::VOTER_REGISTERED,
                start,
                Some(policy_ts),
            )
            .await?
            .into_iter()
            .filter_map(|record| match record.event {
                LedgerEvent::VoterRegistered(r) if r.reward_epoch_id == reward_epoch_id => Some(r),
                _ => None,
            })
            .collect();

        let inflation: Vec<_> = reader
            .query_events(
                ContractName::RewardOffers,
                event_names::INFLATION_REWARDS_OFFERED,
                start,
                Some(policy_ts),
            )
            .await?
            .into_iter()
            .filter_map(|record| match record.event {
                LedgerEvent::InflationRewardsOffered(o) if o.reward_epoch_id == reward_epoch_id => {
                    Some(o)
                }
                _ => None,
            })
            .collect();

        let community: Vec<_> = reader
            .query_events(
                ContractName::RewardOffers,
                event_names::REWARDS_OFFERED,
                start,
                Some(policy_ts),
            )
            .await?
            .into_iter()
            .filter_map(|record| match record.event {
                LedgerEvent::RewardsOffered(o) if o.reward_epoch_id == reward_epoch_id => Some(o),
                _ => None,
            })
            .collect();

        let epoch = RewardEpoch::new(policy, registrations, &inflation, &community)?;
        tracing::info!(
            reward_epoch = reward_epoch_id,
            voters = epoch.registrations.len(),
            feeds = epoch.canonical_feed_order.len(),
            "reward epoch resolved"
        );
        Ok(epoch)
    }

    /// Drop cached epochs older than `keep_from`.
    pub fn prune_before(&self, keep_from: RewardEpochId) {
        self.cache.lock().retain(|id, _| *id >= keep_from);
    }
}
