//! Round calculation inputs read from the ledger index.
//!
//! Commits are read from a round's own window and reveals from its reveal
//! window. Only successful transactions from submit addresses registered for
//! the round's reward epoch count. Raw submissions of a round are cached once
//! the index covers both windows.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use ftso_calc::results::RoundCalculationData;
use ftso_calc::reveal::{benched_voters, match_reveals, RevealSummary};
use ftso_crypto::calldata::ProtocolCodec;
use ftso_index::{IndexReader, RangeStatus, RangeWaiter};
use ftso_registry::{EpochResolver, RewardEpoch};
use ftso_types::ledger::{function_names, ContractName, TxRecord};
use ftso_types::voting::RevealData;
use ftso_types::{EpochSettings, VotingRoundId};

use crate::cache::RoundCache;
use crate::Result;

/// Decoded commit and reveal transactions of one round, unfiltered.
#[derive(Debug, Default)]
pub struct RoundSubmissions {
    /// `(sender, commit hash)` in ledger order.
    pub commits: Vec<(Address, B256)>,
    /// `(sender, reveal)` in ledger order.
    pub reveals: Vec<(Address, RevealData)>,
}

/// Assembles [`RoundCalculationData`] from the index.
pub struct RoundDataSource {
    waiter: RangeWaiter,
    resolver: Arc<EpochResolver>,
    codec: ProtocolCodec,
    benching_window: u32,
    read_timeout: Duration,
    submissions: RoundCache<Arc<RoundSubmissions>>,
}

impl RoundDataSource {
    pub fn new(
        waiter: RangeWaiter,
        resolver: Arc<EpochResolver>,
        codec: ProtocolCodec,
        benching_window: u32,
        read_timeout: Duration,
        retain: usize,
    ) -> Self {
        Self {
            waiter,
            resolver,
            codec,
            benching_window,
            read_timeout,
            submissions: RoundCache::new(retain.max(benching_window as usize + 2)),
        }
    }

    pub fn settings(&self) -> &EpochSettings {
        self.resolver.settings()
    }

    pub fn resolver(&self) -> &Arc<EpochResolver> {
        &self.resolver
    }

    pub fn reader(&self) -> &Arc<dyn IndexReader> {
        self.waiter.reader()
    }

    pub fn codec(&self) -> &ProtocolCodec {
        &self.codec
    }

    /// Index span a round's calculation depends on: its commit window
    /// through its reveal window.
    fn round_span(&self, round: VotingRoundId) -> (u64, u64) {
        let (start, _) = self.settings().commit_window(round);
        let (_, end) = self.settings().reveal_window(round);
        (start, end)
    }

    async fn successful_transactions(
        &self,
        function_name: &str,
        (start, end): (u64, u64),
    ) -> Result<Vec<TxRecord>> {
        Ok(self
            .reader()
            .query_transactions(ContractName::Submission, function_name, start, Some(end))
            .await?
            .into_iter()
            .filter(|tx| tx.status)
            .collect())
    }

    /// Commits and reveals of a round.
    pub async fn submissions(&self, round: VotingRoundId) -> Result<Arc<RoundSubmissions>> {
        if let Some(cached) = self.submissions.get(round) {
            return Ok(cached);
        }

        let (start, end) = self.round_span(round);
        let status = self.waiter.check(start, end).await?;

        let commits = self
            .successful_transactions(function_names::COMMIT, self.settings().commit_window(round))
            .await?
            .into_iter()
            .filter_map(|tx| match self.codec.decode_commit(&tx.input) {
                Ok(hash) => Some((tx.from, hash)),
                Err(e) => {
                    tracing::debug!(voting_round = round, from = %tx.from, error = %e, "undecodable commit");
                    None
                }
            })
            .collect();

        let reveals = self
            .successful_transactions(function_names::REVEAL, self.settings().reveal_window(round))
            .await?
            .into_iter()
            .filter_map(|tx| match self.codec.decode_reveal(&tx.input) {
                Ok(reveal) => Some((tx.from, reveal)),
                Err(e) => {
                    tracing::debug!(voting_round = round, from = %tx.from, error = %e, "undecodable reveal");
                    None
                }
            })
            .collect();

        let submissions = Arc::new(RoundSubmissions { commits, reveals });
        if status == RangeStatus::Ok {
            self.submissions.insert(round, submissions.clone());
        }
        Ok(submissions)
    }

    /// Valid reveals and offenders of a round among the voters of `epoch`.
    pub async fn reveal_summary(
        &self,
        round: VotingRoundId,
        epoch: &RewardEpoch,
    ) -> Result<RevealSummary> {
        let registered: HashSet<Address> = epoch.submit_addresses().into_iter().collect();
        let submissions = self.submissions(round).await?;

        let commits: Vec<(Address, B256)> = submissions
            .commits
            .iter()
            .filter(|(from, _)| registered.contains(from))
            .copied()
            .collect();
        let reveals: Vec<(Address, RevealData)> = submissions
            .reveals
            .iter()
            .filter(|(from, _)| registered.contains(from))
            .cloned()
            .collect();

        Ok(match_reveals(&commits, &reveals))
    }

    /// Everything needed to calculate `round`.
    ///
    /// Waits up to the read timeout for the index to cover the round. The
    /// returned status is `Ok` only when the data is final and may be
    /// cached.
    ///
    /// # Errors
    ///
    /// - [`crate::DaemonError::Registry`] if the reward epoch cannot be
    ///   resolved
    /// - [`crate::DaemonError::Index`] on index read failures
    pub async fn round_data(
        &self,
        round: VotingRoundId,
    ) -> Result<(RoundCalculationData, RangeStatus)> {
        let (start, end) = self.round_span(round);
        let status = self
            .waiter
            .ensure_range(start, end, Some(self.read_timeout))
            .await?;
        if status == RangeStatus::TimeoutOk {
            tracing::warn!(voting_round = round, "calculating with a lagging index");
        }

        let epoch = self.resolver.reward_epoch_for_round(round).await?;
        let summary = self.reveal_summary(round, &epoch).await?;

        let mut previous: Vec<BTreeSet<Address>> = Vec::new();
        for past in round.saturating_sub(self.benching_window)..round {
            previous.push(self.reveal_summary(past, &epoch).await?.offenders);
        }
        let benched = benched_voters(&previous);

        tracing::debug!(
            voting_round = round,
            reward_epoch = epoch.reward_epoch_id,
            valid_reveals = summary.valid_count(),
            offenders = summary.offenders.len(),
            benched = benched.len(),
            "round data assembled"
        );

        Ok((
            RoundCalculationData {
                voting_round_id: round,
                feeds: epoch.canonical_feed_order.clone(),
                voters: epoch.submit_addresses(),
                weights: epoch.median_voting_weights(),
                valid_reveals: summary.valid,
                reveal_offenders: summary.offenders,
                benched,
            },
            status,
        ))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::clock::Clock;
    use crate::config::DaemonConfig;
    use crate::devnet::Devnet;
    use crate::provider::DataProvider;

    fn config(voters: usize) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.epoch.voting_epoch_duration_secs = 20;
        config.epoch.reveal_deadline_secs = 10;
        config.epoch.reward_epoch_duration_in_voting_epochs = 10;
        config.devnet.voters = voters;
        config
    }

    async fn commit(devnet: &Devnet, provider: &DataProvider, round: VotingRoundId) {
        let calldata = provider.commit_calldata(round).await.expect("commit");
        devnet.ledger().include_transaction(
            ContractName::Submission,
            function_names::COMMIT,
            provider.identity().submit_address,
            calldata,
        );
    }

    fn reveal(devnet: &Devnet, provider: &DataProvider, round: VotingRoundId) {
        let calldata = provider
            .reveal_calldata(round)
            .expect("reveal")
            .expect("committed");
        devnet.ledger().include_transaction(
            ContractName::Submission,
            function_names::REVEAL,
            provider.identity().submit_address,
            calldata,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_offenders_are_benched_next_round() {
        let devnet = Devnet::new(&config(3), Clock::starting_at(1_000_000)).expect("devnet");
        let settings = devnet.settings().clone();
        let clock = devnet.ledger().clock();
        let providers: Vec<DataProvider> = (0..3)
            .map(|i| devnet.provider(i).expect("voter"))
            .collect();
        let round = settings.voting_round_for_time(clock.now()) + 1;

        // round: everyone commits, voter 0 never reveals
        clock.sleep_until(settings.round_start_time(round)).await;
        for p in &providers {
            commit(&devnet, p, round).await;
        }
        clock.sleep_until(settings.round_start_time(round + 1)).await;
        for p in &providers {
            commit(&devnet, p, round + 1).await;
        }
        for p in &providers[1..] {
            reveal(&devnet, p, round);
        }
        clock.sleep_until(settings.round_start_time(round + 2)).await;
        for p in &providers {
            reveal(&devnet, p, round + 1);
        }
        clock.sleep_until(settings.reveal_deadline(round + 1)).await;
        devnet.ledger().mine_block();

        let offender = providers[0].identity().submit_address;
        let source = providers[0].data();

        let (first, status) = source.round_data(round).await.expect("round data");
        assert_eq!(status, RangeStatus::Ok);
        assert_eq!(first.valid_reveals.len(), 2);
        assert!(first.reveal_offenders.contains(&offender));
        assert!(first.benched.is_empty());

        let (second, _) = source.round_data(round + 1).await.expect("round data");
        assert_eq!(second.valid_reveals.len(), 3);
        assert!(second.reveal_offenders.is_empty());
        assert_eq!(second.benched, BTreeSet::from([offender]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_senders_ignored() {
        let devnet = Devnet::new(&config(2), Clock::starting_at(1_000_000)).expect("devnet");
        let settings = devnet.settings().clone();
        let clock = devnet.ledger().clock();
        let round = settings.voting_round_for_time(clock.now()) + 1;
        let provider = devnet.provider(0).expect("voter 0");

        clock.sleep_until(settings.round_start_time(round)).await;
        let calldata = provider.commit_calldata(round).await.expect("commit");
        let outsider = Address::repeat_byte(0xee);
        devnet.ledger().include_transaction(
            ContractName::Submission,
            function_names::COMMIT,
            outsider,
            calldata,
        );
        clock.sleep_until(settings.reveal_deadline(round)).await;
        devnet.ledger().mine_block();

        let submissions = provider.data().submissions(round).await.expect("submissions");
        assert_eq!(submissions.commits.len(), 1);

        let (data, _) = provider.data().round_data(round).await.expect("round data");
        assert!(data.reveal_offenders.is_empty());
        assert_eq!(data.voters.len(), 2);
    }
}
