//! Per-entity record of each voter's current vote
//!
//! The rating rule lives in `resolve_vote` and is shared by both store
//! implementations:
//! - no previous vote: record it, rating moves by `value`
//! - same value again: toggle-off, the vote is removed and rating moves by `-value`
//! - opposite value: the vote is replaced and rating moves by `value - previous` (±2)

use std::collections::HashMap;
use std::hash::Hash;
use uuid::Uuid;

use crate::models::VoteValue;

/// Outcome of applying one vote against a voter's previous vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    /// Amount to add to the entity rating
    pub delta: i32,
    /// The voter's vote after this call; `None` means the vote was retracted
    pub recorded: Option<VoteValue>,
}

pub fn resolve_vote(previous: Option<VoteValue>, value: VoteValue) -> VoteChange {
    match previous {
        None => VoteChange {
            delta: value.as_i32(),
            recorded: Some(value),
        },
        Some(prev) if prev == value => VoteChange {
            delta: -value.as_i32(),
            recorded: None,
        },
        Some(prev) => VoteChange {
            delta: value.as_i32() - prev.as_i32(),
            recorded: Some(value),
        },
    }
}

/// entity id -> voter id -> current vote
#[derive(Debug)]
pub struct VoteLedger<K> {
    entries: HashMap<K, HashMap<Uuid, VoteValue>>,
}

impl<K> Default for VoteLedger<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy> VoteLedger<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty ledger entry for a new entity
    pub fn open(&mut self, entity: K) {
        self.entries.entry(entity).or_default();
    }

    /// Drop the entity's entry together with all its votes
    pub fn remove(&mut self, entity: &K) {
        self.entries.remove(entity);
    }

    /// Apply a vote and return the rating delta
    pub fn apply(&mut self, entity: K, voter: Uuid, value: VoteValue) -> i32 {
        let votes = self.entries.entry(entity).or_default();
        let change = resolve_vote(votes.get(&voter).copied(), value);
        match change.recorded {
            Some(recorded) => {
                votes.insert(voter, recorded);
            }
            None => {
                votes.remove(&voter);
            }
        }
        change.delta
    }

    pub fn vote_of(&self, entity: &K, voter: &Uuid) -> Option<VoteValue> {
        self.entries.get(entity)?.get(voter).copied()
    }

    /// Sum of current votes, i.e. what the entity rating must equal
    pub fn total(&self, entity: &K) -> i32 {
        self.entries
            .get(entity)
            .map(|votes| votes.values().map(|v| v.as_i32()).sum())
            .unwrap_or(0)
    }

    pub fn voter_count(&self, entity: &K) -> usize {
        self.entries.get(entity).map(|v| v.len()).unwrap_or(0)
    }

    pub fn contains(&self, entity: &K) -> bool {
        self.entries.contains_key(entity)
    }
}
