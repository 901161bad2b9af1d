//! Bounded per-round caches.

use std::collections::BTreeMap;

use ftso_types::VotingRoundId;
use parking_lot::Mutex;

/// Insert-once cache keyed by voting round, keeping the most recent
/// `retain` rounds.
#[derive(Debug)]
pub struct RoundCache<V> {
    retain: usize,
    entries: Mutex<BTreeMap<VotingRoundId, V>>,
}

impl<V: Clone> RoundCache<V> {
    pub fn new(retain: usize) -> Self {
        Self {
            retain: retain.max(1),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Insert a value unless the round is already present, or the cache is
    /// full and the round is older than everything retained. Returns `true`
    /// if the value was stored.
    pub fn insert(&self, round: VotingRoundId, value: V) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&round) {
            return false;
        }
        let full = entries.len() >= self.retain;
        if full && entries.first_key_value().is_some_and(|(oldest, _)| round < *oldest) {
            return false;
        }
        entries.insert(round, value);
        while entries.len() > self.retain {
            entries.pop_first();
        }
        true
    }

    pub fn get(&self, round: VotingRoundId) -> Option<V> {
        self.entries.lock().get(&round).cloned()
    }

    pub fn contains(&self, round: VotingRoundId) -> bool {
        self.entries.lock().contains_key(&round)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
