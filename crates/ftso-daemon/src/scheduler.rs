//! Voting round state machine.
//!
//! Every round walks through the same phases, strictly in order:
//!
//! ```text
//! AwaitCommitWindow -> Commit -> AwaitRevealWindow -> Reveal
//!   -> AwaitCalcDeadline -> CalculateAndSign -> AwaitFinalization -> Done
//! ```
//!
//! One timer loop drives the rounds. At the start of round `N` it commits
//! for `N`, reveals for `N - 1`, waits for the reveal deadline of `N - 1`
//! and calculates and signs it. Waiting for the finalization of `N - 1`
//! runs as a spawned task so round `N + 1` is never delayed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use ftso_calc::CalcError;
use ftso_types::ledger::{function_names, ContractName};
use ftso_types::voting::FinalizeData;
use ftso_types::{EpochSettings, VotingRoundId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::events::{EventBus, RoundEvent};
use crate::provider::{DataProvider, FinalizationStatus};
use crate::submit::Submitter;
use crate::{DaemonError, Result};

/// Phase of one voting round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoundPhase {
    AwaitCommitWindow,
    Commit,
    AwaitRevealWindow,
    Reveal,
    AwaitCalcDeadline,
    CalculateAndSign,
    AwaitFinalization,
    Done,
}

impl RoundPhase {
    /// Phase that follows this one.
    pub fn next(self) -> Option<RoundPhase> {
        match self {
            RoundPhase::AwaitCommitWindow => Some(RoundPhase::Commit),
            RoundPhase::Commit => Some(RoundPhase::AwaitRevealWindow),
            RoundPhase::AwaitRevealWindow => Some(RoundPhase::Reveal),
            RoundPhase::Reveal => Some(RoundPhase::AwaitCalcDeadline),
            RoundPhase::AwaitCalcDeadline => Some(RoundPhase::CalculateAndSign),
            RoundPhase::CalculateAndSign => Some(RoundPhase::AwaitFinalization),
            RoundPhase::AwaitFinalization => Some(RoundPhase::Done),
            RoundPhase::Done => None,
        }
    }
}

/// Timing of the finalization phase.
#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    pub protocol_id: u8,
    /// A round not finalized within this time is abandoned.
    pub finalization_timeout: Duration,
    /// Delay before a voter that was not selected finalizes by itself.
    pub finalization_grace: Duration,
    pub finalization_poll: Duration,
    /// Rounds whose phase is remembered.
    pub retain: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            protocol_id: config.protocol_id,
            finalization_timeout: config.finalization_timeout(),
            finalization_grace: config.finalization_grace(),
            finalization_poll: config.finalization_poll(),
            retain: config.cache_retention,
        }
    }
}

/// Drives one voter through consecutive voting rounds.
pub struct Scheduler {
    provider: Arc<DataProvider>,
    submitter: Arc<dyn Submitter>,
    clock: Clock,
    settings: SchedulerSettings,
    events: EventBus,
    phases: Mutex<BTreeMap<VotingRoundId, RoundPhase>>,
}

impl Scheduler {
    pub fn new(
        provider: Arc<DataProvider>,
        submitter: Arc<dyn Submitter>,
        clock: Clock,
        settings: SchedulerSettings,
        events: EventBus,
    ) -> Self {
        Self {
            provider,
            submitter,
            clock,
            settings,
            events,
            phases: Mutex::new(BTreeMap::new()),
        }
    }

    /// Last phase a round reached, if it is still remembered.
    pub fn phase(&self, round: VotingRoundId) -> Option<RoundPhase> {
        self.phases.lock().get(&round).copied()
    }

    pub fn provider(&self) -> &Arc<DataProvider> {
        &self.provider
    }

    fn epoch_settings(&self) -> &EpochSettings {
        self.provider.data().settings()
    }

    fn voter(&self) -> Address {
        self.provider.identity().signing_address()
    }

    fn enter(&self, round: VotingRoundId, phase: RoundPhase) {
        tracing::debug!(voter = %self.voter(), voting_round = round, ?phase, "phase");
        let mut phases = self.phases.lock();
        phases.insert(round, phase);
        while phases.len() > self.settings.retain.max(1) {
            phases.pop_first();
        }
    }

    /// Run rounds until `shutdown` fires, starting with the first round that
    /// begins after now.
    ///
    /// # Errors
    ///
    /// Any failure while committing, revealing or calculating is fatal and
    /// ends the loop.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut round = self.epoch_settings().voting_round_for_time(self.clock.now()) + 1;
        tracing::info!(voter = %self.voter(), first_round = round, "scheduler started");
        loop {
            tokio::select! {
                result = self.run_round(round) => {
                    if let Err(e) = result {
                        tracing::error!(voter = %self.voter(), voting_round = round, error = %e, "fatal round error");
                        return Err(e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(voter = %self.voter(), "scheduler stopped");
                    return Ok(());
                }
            }
            round += 1;
        }
    }

    /// Handle the start of round `round`: commit for it, then reveal,
    /// calculate and sign the previous round.
    pub async fn run_round(self: &Arc<Self>, round: VotingRoundId) -> Result<()> {
        self.enter(round, RoundPhase::AwaitCommitWindow);
        self.clock
            .sleep_until(self.epoch_settings().round_start_time(round))
            .await;
        self.commit(round).await?;

        let Some(previous) = round.checked_sub(1) else {
            return Ok(());
        };
        self.reveal(previous).await?;
        self.enter(previous, RoundPhase::AwaitCalcDeadline);
        self.clock
            .sleep_until(self.epoch_settings().reveal_deadline(previous))
            .await;

        if self.calculate_and_sign(previous).await? {
            self.enter(previous, RoundPhase::AwaitFinalization);
            let scheduler = Arc::clone(self);
            tokio::spawn(async move { scheduler.await_finalization(previous).await });
        }
        Ok(())
    }

    async fn commit(&self, round: VotingRoundId) -> Result<()> {
        self.enter(round, RoundPhase::Commit);
        let calldata = self.provider.commit_calldata(round).await?;
        self.submitter
            .submit(ContractName::Submission, function_names::COMMIT, calldata)
            .await?;
        tracing::info!(voter = %self.voter(), voting_round = round, "commit submitted");
        self.events.emit(RoundEvent::CommitSubmitted {
            voter: self.voter(),
            voting_round: round,
        });
        self.enter(round, RoundPhase::AwaitRevealWindow);
        Ok(())
    }

    async fn reveal(&self, round: VotingRoundId) -> Result<()> {
        self.enter(round, RoundPhase::Reveal);
        let Some(calldata) = self.provider.reveal_calldata(round)? else {
            tracing::debug!(voter = %self.voter(), voting_round = round, "nothing to reveal");
            return Ok(());
        };
        self.submitter
            .submit(ContractName::Submission, function_names::REVEAL, calldata)
            .await?;
        tracing::info!(voter = %self.voter(), voting_round = round, "reveal submitted");
        self.events.emit(RoundEvent::RevealSubmitted {
            voter: self.voter(),
            voting_round: round,
        });
        Ok(())
    }

    /// Returns `false` when the round was abandoned for lack of reveals.
    async fn calculate_and_sign(&self, round: VotingRoundId) -> Result<bool> {
        self.enter(round, RoundPhase::CalculateAndSign);
        let (result, signature, calldata) = match self.provider.sign_result(round).await {
            Ok(signed) => signed,
            Err(DaemonError::Calc(CalcError::NoValidReveals(_))) => {
                tracing::warn!(voter = %self.voter(), voting_round = round, "no valid reveals, round abandoned");
                self.enter(round, RoundPhase::Done);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.submitter
            .submit(ContractName::Submission, function_names::SIGN_RESULT, calldata)
            .await?;
        tracing::info!(
            voter = %self.voter(),
            voting_round = round,
            merkle_root = %signature.merkle_root,
            is_secure = result.random_data.is_secure,
            "result signed"
        );
        self.events.emit(RoundEvent::ResultSigned {
            voter: self.voter(),
            voting_round: round,
            merkle_root: signature.merkle_root,
            is_secure: result.random_data.is_secure,
        });
        Ok(true)
    }

    async fn finalize(&self, data: &FinalizeData) -> Result<()> {
        let calldata = self.provider.data().codec().encode_finalize(data)?;
        self.submitter
            .submit(ContractName::Submission, function_names::FINALIZE, calldata)
            .await?;
        Ok(())
    }

    /// Wait for the round to be finalized, finalizing it ourselves when
    /// enough signatures are on the ledger. Selected finalizers act at once,
    /// everyone else after the grace period.
    async fn await_finalization(&self, round: VotingRoundId) {
        let started = Instant::now();
        let deadline = started + self.settings.finalization_timeout;
        let eligible = match self
            .provider
            .is_eligible_finalizer(round, self.settings.protocol_id)
            .await
        {
            Ok(eligible) => eligible,
            Err(e) => {
                tracing::warn!(voter = %self.voter(), voting_round = round, error = %e, "finalizer selection failed");
                false
            }
        };
        let finalize_from = if eligible {
            started
        } else {
            started + self.settings.finalization_grace
        };

        loop {
            match self.provider.finalization_status(round).await {
                Ok(FinalizationStatus::Finalized(merkle_root)) => {
                    tracing::info!(voter = %self.voter(), voting_round = round, %merkle_root, "round finalized");
                    self.events.emit(RoundEvent::RoundFinalized {
                        voter: self.voter(),
                        voting_round: round,
                        merkle_root,
                        by_self: false,
                    });
                    break;
                }
                Ok(FinalizationStatus::Ready(data)) if Instant::now() >= finalize_from => {
                    match self.finalize(&data).await {
                        Ok(()) => {
                            tracing::info!(
                                voter = %self.voter(),
                                voting_round = round,
                                merkle_root = %data.merkle_root,
                                signatures = data.signatures.len(),
                                eligible,
                                "finalization submitted"
                            );
                            self.events.emit(RoundEvent::RoundFinalized {
                                voter: self.voter(),
                                voting_round: round,
                                merkle_root: data.merkle_root,
                                by_self: true,
                            });
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(voter = %self.voter(), voting_round = round, error = %e, "finalize submission failed");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(voter = %self.voter(), voting_round = round, error = %e, "finalization check failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    voter = %self.voter(),
                    voting_round = round,
                    timeout = ?self.settings.finalization_timeout,
                    "finalization timed out, round abandoned"
                );
                self.events.emit(RoundEvent::FinalizationTimedOut {
                    voter: self.voter(),
                    voting_round: round,
                });
                break;
            }
            tokio::time::sleep(self.settings.finalization_poll.min(deadline - now)).await;
        }
        self.enter(round, RoundPhase::Done);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::DaemonConfig;
    use crate::devnet::Devnet;

    fn config(voters: usize) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.epoch.voting_epoch_duration_secs = 20;
        config.epoch.reveal_deadline_secs = 10;
        config.epoch.reward_epoch_duration_in_voting_epochs = 10;
        config.devnet.voters = voters;
        config
    }

    #[test]
    fn test_phase_order() {
        let mut phase = RoundPhase::AwaitCommitWindow;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            seen.push(next);
            phase = next;
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(phase, RoundPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_finalize() {
        let devnet = Arc::new(Devnet::new(&config(3), Clock::starting_at(1_000_000)).expect("devnet"));
        let (shutdown, _) = broadcast::channel(1);
        let mut events = devnet.events().subscribe();
        let mut tasks = tokio::task::JoinSet::new();
        devnet.spawn(&mut tasks, &shutdown);

        let schedulers = devnet.schedulers();
        let first = devnet.settings().voting_round_for_time(devnet.ledger().clock().now()) + 1;

        let mut finalized = HashSet::new();
        let mut signed_roots = Vec::new();
        while finalized.len() < 3 {
            let event = tokio::time::timeout(Duration::from_secs(300), events.recv())
                .await
                .expect("event before timeout")
                .expect("bus open");
            match event {
                RoundEvent::ResultSigned { voting_round, merkle_root, is_secure, .. } if voting_round == first => {
                    assert!(is_secure);
                    signed_roots.push(merkle_root);
                }
                RoundEvent::RoundFinalized { voting_round, voter, .. } if voting_round == first => {
                    finalized.insert(voter);
                }
                RoundEvent::FinalizationTimedOut { voting_round, .. } => {
                    assert_ne!(voting_round, first, "round {first} timed out");
                }
                _ => {}
            }
        }

        assert_eq!(signed_roots.len(), 3);
        assert!(signed_roots.windows(2).all(|w| w[0] == w[1]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        for scheduler in &schedulers {
            assert_eq!(scheduler.phase(first), Some(RoundPhase::Done));
        }
        let _ = shutdown.send(());
    }
}
