//! Local simulated network.
//!
//! A devnet is one in-process ledger shared by `N` local voters. At startup
//! it writes a genesis block and the registration data of every reward
//! epoch whose registration is already due; a heartbeat task then produces
//! one block per tick and publishes the registration of the next reward
//! epoch halfway through the current one. Each voter runs its own
//! [`Scheduler`] against the shared index.
//!
//! Registration data of epoch `E` is written as one block: the voter
//! registrations and the inflation offer, followed by the signing policy.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use ftso_crypto::abi::{encode, Token};
use ftso_crypto::calldata::ProtocolCodec;
use ftso_crypto::ecdsa::LocalSigner;
use ftso_crypto::hash::keccak256;
use ftso_index::{MemoryIndex, RangeWaiter};
use ftso_registry::EpochResolver;
use ftso_types::feed::CATEGORY_CRYPTO;
use ftso_types::ledger::LedgerEvent;
use ftso_types::voting::{InflationOffer, SigningPolicy, VoterRegistration};
use ftso_types::{EpochSettings, Feed, FeedId, RewardEpochId, Weight, TOTAL_BIPS};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::clock::Clock;
use crate::config::DaemonConfig;
use crate::data::RoundDataSource;
use crate::events::EventBus;
use crate::ledger::DevLedger;
use crate::prices::PriceProvider;
use crate::provider::{DataProvider, VoterIdentity};
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::submit::LedgerSubmitter;
use crate::Result;

/// Inflation offered per reward epoch on the devnet.
const INFLATION_PER_EPOCH: u128 = 1_000_000;

/// A voter of the devnet.
#[derive(Clone, Debug)]
pub struct DevnetVoter {
    pub identity: VoterIdentity,
    /// Entity address the voter registers under.
    pub delegation_address: Address,
    pub signing_weight: u16,
    pub median_weight: Weight,
}

/// In-process network of local voters.
pub struct Devnet {
    config: DaemonConfig,
    settings: EpochSettings,
    ledger: Arc<DevLedger>,
    data: Arc<RoundDataSource>,
    voters: Vec<DevnetVoter>,
    feeds: Vec<Feed>,
    events: EventBus,
    schedulers: Vec<Arc<Scheduler>>,
    /// Next reward epoch whose registration has not been published.
    next_registration: Mutex<RewardEpochId>,
}

/// Deterministic devnet voters.
fn generate_voters(count: usize, seed: u64) -> Result<Vec<DevnetVoter>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| -> Result<DevnetVoter> {
            let signer = LocalSigner::from_bytes(&rng.gen::<[u8; 32]>())?;
            Ok(DevnetVoter {
                identity: VoterIdentity {
                    signer,
                    submit_address: Address::from(rng.gen::<[u8; 20]>()),
                    submit_signatures_address: Address::from(rng.gen::<[u8; 20]>()),
                },
                delegation_address: Address::from(rng.gen::<[u8; 20]>()),
                signing_weight: (i % 5 + 1) as u16 * 100,
                median_weight: (i as Weight + 1) * 1_000,
            })
        })
        .collect()
}

/// Round 0 start for a devnet launched at `now`: two whole rounds ago, so
/// the first scheduled round starts within one round.
fn devnet_first_round_start(now: u64, round_secs: u64) -> u64 {
    (now - now % round_secs).saturating_sub(2 * round_secs)
}

impl Devnet {
    /// Build a devnet and write its genesis and due registrations.
    ///
    /// # Errors
    ///
    /// - [`crate::DaemonError::Crypto`] if a generated key is invalid
    pub fn new(config: &DaemonConfig, clock: Clock) -> Result<Self> {
        let epoch = &config.epoch;
        let first_ts = if epoch.first_voting_round_start_ts == 0 {
            devnet_first_round_start(clock.now(), epoch.voting_epoch_duration_secs)
        } else {
            epoch.first_voting_round_start_ts
        };
        let settings = epoch.settings_starting_at(first_ts);

        let index = Arc::new(MemoryIndex::new());
        let ledger = Arc::new(DevLedger::new(index.clone(), clock));
        let waiter = RangeWaiter::with_poll_interval(index, config.indexer.poll_interval());
        let resolver = Arc::new(EpochResolver::new(waiter.clone(), settings.clone()));
        let data = Arc::new(RoundDataSource::new(
            waiter,
            resolver,
            ProtocolCodec::new(),
            config.protocol.benching_window,
            config.indexer.read_timeout(),
            config.protocol.cache_retention,
        ));

        let feeds = config
            .feeds
            .feeds
            .iter()
            .map(|f| Feed::new(FeedId::from_name(CATEGORY_CRYPTO, &f.name), f.decimals))
            .collect();

        let mut devnet = Self {
            config: config.clone(),
            settings,
            ledger,
            data,
            voters: generate_voters(config.devnet.voters, config.devnet.seed)?,
            feeds,
            events: EventBus::default(),
            schedulers: Vec::new(),
            next_registration: Mutex::new(0),
        };
        devnet.schedulers = devnet
            .voters
            .iter()
            .enumerate()
            .map(|(i, voter)| devnet.build_scheduler(i, voter))
            .collect();

        let (window_start, _) = devnet.settings.registration_window(0);
        devnet.ledger.mine_block_at(window_start.saturating_sub(1));
        devnet.publish_due_registrations(Some(window_start));

        tracing::info!(
            voters = devnet.voters.len(),
            feeds = devnet.feeds.len(),
            first_voting_round_start_ts = first_ts,
            "devnet created"
        );
        Ok(devnet)
    }

    pub fn settings(&self) -> &EpochSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<DevLedger> {
        &self.ledger
    }

    pub fn voters(&self) -> &[DevnetVoter] {
        &self.voters
    }

    /// Feeds offered every reward epoch, in configuration order.
    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn schedulers(&self) -> Vec<Arc<Scheduler>> {
        self.schedulers.clone()
    }

    /// A fresh data provider for voter `index`, sharing the devnet index.
    /// `None` if there is no such voter.
    pub fn provider(&self, index: usize) -> Option<DataProvider> {
        self.voters
            .get(index)
            .map(|voter| self.provider_for(index, voter))
    }

    fn provider_for(&self, index: usize, voter: &DevnetVoter) -> DataProvider {
        DataProvider::new(
            voter.identity.clone(),
            PriceProvider::from_config(&self.config.feeds, self.config.devnet.seed + index as u64),
            self.data.clone(),
            self.config.protocol.cache_retention,
        )
    }

    fn build_scheduler(&self, index: usize, voter: &DevnetVoter) -> Arc<Scheduler> {
        let submitter = LedgerSubmitter::new(self.ledger.clone(), voter.identity.submit_address);
        Arc::new(Scheduler::new(
            Arc::new(self.provider_for(index, voter)),
            Arc::new(submitter),
            self.ledger.clock(),
            SchedulerSettings::from_config(&self.config.protocol),
            self.events.clone(),
        ))
    }

    /// Time at which the registration of `epoch` is published.
    pub fn registration_time(&self, epoch: RewardEpochId) -> u64 {
        match epoch.checked_sub(1) {
            None => self.settings.registration_window(0).0,
            Some(previous) => {
                self.settings.reward_epoch_start_time(previous)
                    + self.settings.reward_epoch_duration_secs() / 2
            }
        }
    }

    /// Policy seed of a reward epoch.
    fn policy_seed(&self, epoch: RewardEpochId) -> U256 {
        U256::from_be_bytes(
            keccak256(encode(&[
                Token::Uint(U256::from(self.config.devnet.seed)),
                Token::Uint(U256::from(epoch)),
            ]))
            .0,
        )
    }

    /// Registration events of a reward epoch, policy last.
    pub fn registration_events(&self, epoch: RewardEpochId) -> Vec<LedgerEvent> {
        let mut events: Vec<LedgerEvent> = self
            .voters
            .iter()
            .map(|v| {
                LedgerEvent::VoterRegistered(VoterRegistration {
                    reward_epoch_id: epoch,
                    voter: v.delegation_address,
                    signing_address: v.identity.signing_address(),
                    submit_address: v.identity.submit_address,
                    submit_signatures_address: v.identity.submit_signatures_address,
                    registration_weight: v.median_weight,
                    wnat_weight: v.median_weight,
                    wnat_capped_weight: v.median_weight,
                })
            })
            .collect();

        events.push(LedgerEvent::InflationRewardsOffered(InflationOffer {
            reward_epoch_id: epoch,
            feeds: self.feeds.clone(),
            amount: INFLATION_PER_EPOCH,
        }));

        let weights: Vec<u16> = self.voters.iter().map(|v| v.signing_weight).collect();
        let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        let threshold = total * self.config.protocol.signing_threshold_bips / TOTAL_BIPS;
        events.push(LedgerEvent::SigningPolicyInitialized(SigningPolicy {
            reward_epoch_id: epoch,
            start_voting_round_id: self.settings.reward_epoch_start_round(epoch),
            threshold: u16::try_from(threshold).unwrap_or(u16::MAX),
            seed: self.policy_seed(epoch),
            voters: self.voters.iter().map(|v| v.identity.signing_address()).collect(),
            weights,
        }));
        events
    }

    /// Publish every registration whose time has come. `first_at` forces the
    /// timestamp of the first one written.
    fn publish_due_registrations(&self, first_at: Option<u64>) {
        let now = self.ledger.clock().now();
        let mut next = self.next_registration.lock();
        let mut first_at = first_at;
        loop {
            let at = first_at.take().unwrap_or_else(|| self.registration_time(*next));
            if at > now {
                break;
            }
            let block = self
                .ledger
                .emit_events_at(at, self.registration_events(*next));
            tracing::info!(reward_epoch = *next, block, timestamp = at, "registration published");
            *next += 1;
        }
    }

    /// Produce a block and publish any registration that became due.
    pub fn heartbeat(&self) {
        self.ledger.mine_block();
        self.publish_due_registrations(None);
    }

    /// Spawn the heartbeat and one scheduler per voter into `tasks`. All of
    /// them stop when `shutdown` fires.
    pub fn spawn(self: &Arc<Self>, tasks: &mut JoinSet<Result<()>>, shutdown: &broadcast::Sender<()>) {
        let devnet = Arc::clone(self);
        let mut stop = shutdown.subscribe();
        let tick = Duration::from_millis(self.config.devnet.heartbeat_ms.max(1));
        tasks.spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => devnet.heartbeat(),
                    _ = stop.recv() => return Ok(()),
                }
            }
        });

        for scheduler in &self.schedulers {
            tasks.spawn(Arc::clone(scheduler).run(shutdown.subscribe()));
        }
    }
}
