//! Per-voter payload construction.
//!
//! A [`DataProvider`] owns one voter's identity, its price source and its
//! caches. The reveal for a round is generated together with the commit and
//! kept until the reveal window; calculated results are kept once the index
//! range behind them is final.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use ftso_calc::codec::encode_values;
use ftso_calc::results::{calculate_results_for_voting_round, EpochResult};
use ftso_crypto::commit::reveal_commit_hash;
use ftso_crypto::ecdsa::LocalSigner;
use ftso_finalize::eligibility::is_eligible_finalizer;
use ftso_finalize::message::sign_result;
use ftso_finalize::try_finalize;
use ftso_index::RangeStatus;
use ftso_types::ledger::{function_names, ContractName};
use ftso_types::voting::{FinalizeData, RevealData, SignatureData};
use ftso_types::VotingRoundId;

use crate::cache::RoundCache;
use crate::data::RoundDataSource;
use crate::prices::PriceProvider;
use crate::Result;

/// Addresses and signing key of one voter.
#[derive(Clone, Debug)]
pub struct VoterIdentity {
    /// Signs round results; its address is the policy voter.
    pub signer: LocalSigner,
    /// Sends commits and reveals.
    pub submit_address: Address,
    /// Sends result signatures.
    pub submit_signatures_address: Address,
}

impl VoterIdentity {
    pub fn signing_address(&self) -> Address {
        self.signer.address()
    }
}

/// Where a round stands with respect to finalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizationStatus {
    /// A finalize transaction for the round is on the ledger.
    Finalized(B256),
    /// Enough signatures for one root; ready to submit.
    Ready(FinalizeData),
    /// No root has reached the threshold yet.
    Pending,
}

/// Builds one voter's commit, reveal, signature and finalize payloads.
pub struct DataProvider {
    identity: VoterIdentity,
    prices: PriceProvider,
    data: Arc<RoundDataSource>,
    reveals: RoundCache<RevealData>,
    results: RoundCache<Arc<EpochResult>>,
}

impl DataProvider {
    pub fn new(
        identity: VoterIdentity,
        prices: PriceProvider,
        data: Arc<RoundDataSource>,
        retain: usize,
    ) -> Self {
        Self {
            identity,
            prices,
            data,
            reveals: RoundCache::new(retain),
            results: RoundCache::new(retain),
        }
    }

    pub fn identity(&self) -> &VoterIdentity {
        &self.identity
    }

    pub fn data(&self) -> &Arc<RoundDataSource> {
        &self.data
    }

    /// Reveal data prepared for a round, if this voter committed to it.
    pub fn reveal_data(&self, round: VotingRoundId) -> Option<RevealData> {
        self.reveals.get(round)
    }

    /// Commit calldata for a round.
    ///
    /// The first call fixes the round's prices and random; later calls
    /// return the same commit.
    ///
    /// # Errors
    ///
    /// - [`crate::DaemonError::Registry`] if the round's reward epoch is not
    ///   resolvable
    /// - [`crate::DaemonError::Calc`] if a price does not fit the value
    ///   encoding
    pub async fn commit_calldata(&self, round: VotingRoundId) -> Result<Vec<u8>> {
        let reveal = match self.reveals.get(round) {
            Some(reveal) => reveal,
            None => {
                let epoch = self.data.resolver().reward_epoch_for_round(round).await?;
                let feeds = &epoch.canonical_feed_order;
                let prices = self.prices.prices(feeds);
                let reveal = RevealData {
                    random: B256::from(rand::random::<[u8; 32]>()),
                    encoded_values: encode_values(&prices, feeds)?,
                };
                self.reveals.insert(round, reveal.clone());
                reveal
            }
        };
        let hash = reveal_commit_hash(&self.identity.submit_address, &reveal);
        Ok(self.data.codec().encode_commit(&hash)?)
    }

    /// Reveal calldata for a round, or `None` if nothing was committed.
    pub fn reveal_calldata(&self, round: VotingRoundId) -> Result<Option<Vec<u8>>> {
        match self.reveals.get(round) {
            Some(reveal) => Ok(Some(self.data.codec().encode_reveal(&reveal)?)),
            None => Ok(None),
        }
    }

    /// Calculated result of a round.
    ///
    /// # Errors
    ///
    /// - [`crate::DaemonError::Calc`] with `NoValidReveals` if nobody
    ///   revealed validly
    pub async fn epoch_result(&self, round: VotingRoundId) -> Result<Arc<EpochResult>> {
        if let Some(result) = self.results.get(round) {
            return Ok(result);
        }
        let (data, status) = self.data.round_data(round).await?;
        let result = Arc::new(calculate_results_for_voting_round(&data)?);
        if status == RangeStatus::Ok {
            self.results.insert(round, result.clone());
        }
        Ok(result)
    }

    /// Calculate a round, sign its root and encode the `signResult` call.
    pub async fn sign_result(
        &self,
        round: VotingRoundId,
    ) -> Result<(Arc<EpochResult>, SignatureData, Vec<u8>)> {
        let result = self.epoch_result(round).await?;
        let root = result.merkle_root()?;
        let signature = sign_result(&self.identity.signer, round, root)?;
        let calldata = self.data.codec().encode_sign_result(&signature)?;
        Ok((result, signature, calldata))
    }

    /// Check the ledger for a finalization of `round`, or for enough
    /// signatures to finalize it.
    pub async fn finalization_status(&self, round: VotingRoundId) -> Result<FinalizationStatus> {
        let (since, _) = self.data.settings().reveal_window(round);
        let reader = self.data.reader();
        let codec = self.data.codec();

        let finalized = reader
            .query_transactions(ContractName::Submission, function_names::FINALIZE, since, None)
            .await?
            .into_iter()
            .filter(|tx| tx.status)
            .filter_map(|tx| codec.decode_finalize(&tx.input).ok())
            .find(|f| f.epoch_id == round);
        if let Some(data) = finalized {
            return Ok(FinalizationStatus::Finalized(data.merkle_root));
        }

        let signatures: Vec<SignatureData> = reader
            .query_transactions(ContractName::Submission, function_names::SIGN_RESULT, since, None)
            .await?
            .into_iter()
            .filter(|tx| tx.status)
            .filter_map(|tx| codec.decode_sign_result(&tx.input).ok())
            .filter(|s| s.epoch_id == round)
            .collect();

        let epoch = self.data.resolver().reward_epoch_for_round(round).await?;
        Ok(match try_finalize(&epoch.signing_policy, round, &signatures) {
            Some(data) => FinalizationStatus::Ready(data),
            None => FinalizationStatus::Pending,
        })
    }

    /// Whether this voter should finalize `round` without waiting.
    pub async fn is_eligible_finalizer(&self, round: VotingRoundId, protocol_id: u8) -> Result<bool> {
        let epoch = self.data.resolver().reward_epoch_for_round(round).await?;
        Ok(is_eligible_finalizer(
            &epoch.signing_policy,
            protocol_id,
            round,
            &self.identity.signing_address(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use ftso_crypto::calldata::ProtocolCodec;
    use ftso_types::ledger::TxRecord;

    use super::*;
    use crate::clock::Clock;
    use crate::config::DaemonConfig;
    use crate::devnet::Devnet;
    use crate::ledger::contract_address;

    fn config(voters: usize) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.epoch.voting_epoch_duration_secs = 20;
        config.epoch.reveal_deadline_secs = 10;
        config.epoch.reward_epoch_duration_in_voting_epochs = 10;
        config.devnet.voters = voters;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_matches_reveal() {
        let devnet = Devnet::new(&config(2), Clock::starting_at(1_000_000)).expect("devnet");
        let provider = devnet.provider(0).expect("voter 0");
        let codec = ProtocolCodec::new();

        let commit = provider.commit_calldata(5).await.expect("commit");
        // repeated calls are stable
        assert_eq!(provider.commit_calldata(5).await.expect("commit"), commit);

        let reveal = codec
            .decode_reveal(&provider.reveal_calldata(5).expect("reveal").expect("committed"))
            .expect("decode");
        let hash = codec.decode_commit(&commit).expect("decode");
        assert_eq!(reveal_commit_hash(&provider.identity().submit_address, &reveal), hash);
        assert!(provider.reveal_calldata(6).expect("reveal").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_result_from_ledger() {
        let devnet = Devnet::new(&config(3), Clock::starting_at(1_000_000)).expect("devnet");
        let settings = devnet.settings().clone();
        let clock = devnet.ledger().clock();
        let providers: Vec<DataProvider> = (0..3)
            .map(|i| devnet.provider(i).expect("voter"))
            .collect();
        let round = settings.voting_round_for_time(clock.now()) + 1;

        clock.sleep_until(settings.round_start_time(round)).await;
        for p in &providers {
            let calldata = p.commit_calldata(round).await.expect("commit");
            devnet.ledger().include_transaction(
                ContractName::Submission,
                function_names::COMMIT,
                p.identity().submit_address,
                calldata,
            );
        }

        clock.sleep_until(settings.round_start_time(round + 1)).await;
        for p in &providers {
            let calldata = p.reveal_calldata(round).expect("reveal").expect("committed");
            devnet.ledger().include_transaction(
                ContractName::Submission,
                function_names::REVEAL,
                p.identity().submit_address,
                calldata,
            );
        }

        clock.sleep_until(settings.reveal_deadline(round)).await;
        devnet.ledger().mine_block();

        let roots: Vec<B256> = {
            let mut roots = Vec::new();
            for p in &providers {
                let result = p.epoch_result(round).await.expect("result");
                assert!(result.random_data.is_secure);
                assert_eq!(result.median_data.len(), devnet.feeds().len());
                roots.push(result.merkle_root().expect("root"));
            }
            roots
        };
        assert!(roots.windows(2).all(|w| w[0] == w[1]));

        let btc = &devnet.feeds()[0];
        let median = providers[0]
            .epoch_result(round)
            .await
            .expect("cached")
            .median_for_feed(&btc.id)
            .expect("btc")
            .data
            .final_median;
        assert_eq!(median.to_f64(), Some(64_000.0));

        for p in &providers {
            let (_, _, calldata) = p.sign_result(round).await.expect("sign");
            devnet.ledger().include_transaction(
                ContractName::Submission,
                function_names::SIGN_RESULT,
                p.identity().submit_signatures_address,
                calldata,
            );
        }
        let status = providers[0].finalization_status(round).await.expect("status");
        assert!(matches!(status, FinalizationStatus::Ready(ref data) if data.merkle_root == roots[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_from_lagging_index_is_recalculated() {
        let devnet = Devnet::new(&config(2), Clock::starting_at(1_000_000)).expect("devnet");
        let settings = devnet.settings().clone();
        let clock = devnet.ledger().clock();
        let providers: Vec<DataProvider> = (0..2)
            .map(|i| devnet.provider(i).expect("voter"))
            .collect();
        let round = settings.voting_round_for_time(clock.now()) + 1;

        clock.sleep_until(settings.round_start_time(round)).await;
        for p in &providers {
            let calldata = p.commit_calldata(round).await.expect("commit");
            devnet.ledger().include_transaction(
                ContractName::Submission,
                function_names::COMMIT,
                p.identity().submit_address,
                calldata,
            );
        }

        // only the first reveal is indexed, and no block follows the window
        clock.sleep_until(settings.round_start_time(round + 1)).await;
        let first = providers[0].reveal_calldata(round).expect("reveal").expect("committed");
        devnet.ledger().include_transaction(
            ContractName::Submission,
            function_names::REVEAL,
            providers[0].identity().submit_address,
            first,
        );

        let lagging = providers[0].epoch_result(round).await.expect("result");
        assert!(!lagging.random_data.is_secure);
        let btc = &lagging.median_data[0];
        assert!(btc.data.participating_weight < btc.total_voting_weight);

        // the indexer catches up with the second reveal, then moves past the window
        let (block_number, timestamp) = devnet.ledger().index().latest_block().expect("block");
        devnet.ledger().index().push_transaction(TxRecord {
            hash: B256::repeat_byte(0xab),
            contract: ContractName::Submission,
            function_name: function_names::REVEAL.to_string(),
            input: providers[1].reveal_calldata(round).expect("reveal").expect("committed"),
            from: providers[1].identity().submit_address,
            to: contract_address(ContractName::Submission),
            block_number,
            status: true,
            timestamp,
        });
        clock.sleep_until(settings.reveal_deadline(round) + 2).await;
        devnet.ledger().mine_block();

        let settled = providers[0].epoch_result(round).await.expect("result");
        assert!(!Arc::ptr_eq(&lagging, &settled));
        assert!(settled.random_data.is_secure);
        let btc = &settled.median_data[0];
        assert_eq!(btc.data.participating_weight, btc.total_voting_weight);
        assert_ne!(
            settled.merkle_root().expect("root"),
            lagging.merkle_root().expect("root")
        );

        // a result from a covered range is cached
        let again = providers[0].epoch_result(round).await.expect("result");
        assert!(Arc::ptr_eq(&settled, &again));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reveals_is_an_error() {
        let devnet = Devnet::new(&config(2), Clock::starting_at(1_000_000)).expect("devnet");
        let settings = devnet.settings().clone();
        let clock = devnet.ledger().clock();
        let round = settings.voting_round_for_time(clock.now());
        clock.sleep_until(settings.reveal_deadline(round)).await;
        devnet.ledger().mine_block();

        let err = devnet
            .provider(0)
            .expect("voter 0")
            .epoch_result(round)
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            crate::DaemonError::Calc(ftso_calc::CalcError::NoValidReveals(_))
        ));
    }
}
