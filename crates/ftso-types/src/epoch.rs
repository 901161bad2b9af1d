//! Voting round and reward epoch timing.
//!
//! Voting rounds are fixed-length windows starting at
//! `first_voting_round_start_ts`. Round `N` accepts commits during its own
//! window and reveals during the first `reveal_deadline_secs` of round
//! `N + 1`. Reward epochs group a fixed number of consecutive voting rounds,
//! starting at `first_reward_epoch_start_voting_round_id`.
//!
//! All windows returned here are inclusive `(start, end)` pairs in Unix
//! seconds, matching the inclusive ranges of ledger index queries.

use serde::{Deserialize, Serialize};

use crate::{RewardEpochId, TypesError, VotingRoundId};

/// Epoch timing constants shared by every node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSettings {
    /// Start of voting round 0 (Unix seconds).
    pub first_voting_round_start_ts: u64,
    /// Length of one voting round in seconds.
    pub voting_epoch_duration_secs: u64,
    /// Voting round at which reward epoch 0 starts.
    pub first_reward_epoch_start_voting_round_id: VotingRoundId,
    /// Number of voting rounds in one reward epoch.
    pub reward_epoch_duration_in_voting_epochs: u32,
    /// Length of the reveal window at the start of the following round.
    pub reveal_deadline_secs: u64,
}

impl EpochSettings {
    /// Check that the settings describe a usable schedule.
    pub fn validate(&self) -> crate::Result<()> {
        if self.voting_epoch_duration_secs == 0 {
            return Err(TypesError::InvalidSettings(
                "voting epoch duration must be positive".to_string(),
            ));
        }
        if self.reward_epoch_duration_in_voting_epochs == 0 {
            return Err(TypesError::InvalidSettings(
                "reward epoch duration must be positive".to_string(),
            ));
        }
        if self.reveal_deadline_secs == 0
            || self.reveal_deadline_secs >= self.voting_epoch_duration_secs
        {
            return Err(TypesError::InvalidSettings(format!(
                "reveal deadline {}s must be within (0, {})",
                self.reveal_deadline_secs, self.voting_epoch_duration_secs
            )));
        }
        Ok(())
    }

    /// Voting round containing the given timestamp.
    ///
    /// Timestamps before the first round map to round 0.
    pub fn voting_round_for_time(&self, ts: u64) -> VotingRoundId {
        let elapsed = ts.saturating_sub(self.first_voting_round_start_ts);
        (elapsed / self.voting_epoch_duration_secs) as VotingRoundId
    }

    /// Start timestamp of a voting round.
    pub fn round_start_time(&self, round: VotingRoundId) -> u64 {
        self.first_voting_round_start_ts + u64::from(round) * self.voting_epoch_duration_secs
    }

    /// Inclusive commit window of a voting round (the round itself).
    pub fn commit_window(&self, round: VotingRoundId) -> (u64, u64) {
        let start = self.round_start_time(round);
        (start, start + self.voting_epoch_duration_secs - 1)
    }

    /// Inclusive reveal window of a voting round.
    pub fn reveal_window(&self, round: VotingRoundId) -> (u64, u64) {
        let start = self.round_start_time(round + 1);
        (start, start + self.reveal_deadline_secs - 1)
    }

    /// First instant at which a round's results may be calculated.
    pub fn reveal_deadline(&self, round: VotingRoundId) -> u64 {
        self.round_start_time(round + 1) + self.reveal_deadline_secs
    }

    /// Round whose reveal window contains `ts`, if any.
    pub fn reveal_round_for_time(&self, ts: u64) -> Option<VotingRoundId> {
        if ts < self.first_voting_round_start_ts {
            return None;
        }
        let current = self.voting_round_for_time(ts);
        if current == 0 {
            return None;
        }
        let offset = ts - self.round_start_time(current);
        (offset < self.reveal_deadline_secs).then(|| current - 1)
    }

    /// Start of the next voting round strictly after `ts`.
    pub fn next_round_start(&self, ts: u64) -> u64 {
        if ts < self.first_voting_round_start_ts {
            return self.first_voting_round_start_ts;
        }
        self.round_start_time(self.voting_round_for_time(ts) + 1)
    }

    /// Reward epoch a voting round belongs to.
    pub fn reward_epoch_for_round(&self, round: VotingRoundId) -> RewardEpochId {
        round.saturating_sub(self.first_reward_epoch_start_voting_round_id)
            / self.reward_epoch_duration_in_voting_epochs
    }

    /// First voting round of a reward epoch.
    pub fn reward_epoch_start_round(&self, epoch: RewardEpochId) -> VotingRoundId {
        self.first_reward_epoch_start_voting_round_id
            + epoch * self.reward_epoch_duration_in_voting_epochs
    }

    /// Start timestamp of a reward epoch.
    pub fn reward_epoch_start_time(&self, epoch: RewardEpochId) -> u64 {
        self.round_start_time(self.reward_epoch_start_round(epoch))
    }

    /// Length of a reward epoch in seconds.
    pub fn reward_epoch_duration_secs(&self) -> u64 {
        u64::from(self.reward_epoch_duration_in_voting_epochs) * self.voting_epoch_duration_secs
    }

    /// Inclusive time window in which a reward epoch's registration data
    /// (signing policy, voter registrations, offers) is published: the one
    /// reward-epoch-long span before it starts.
    pub fn registration_window(&self, epoch: RewardEpochId) -> (u64, u64) {
        let end = self.reward_epoch_start_time(epoch);
        (
            end.saturating_sub(self.reward_epoch_duration_secs()),
            end.saturating_sub(1),
        )
    }
}
