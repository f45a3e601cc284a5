//! Tracker Store — the sole owner of every live chain
//!
//! Primary map `TrackingKey -> Chain` plus an `owner -> keys` index kept in
//! sync on every put/remove, so the reply observer can sweep one owner's
//! channel without scanning the whole store.
//!
//! Terminal chains are never stored: completion and cancellation both end in
//! [`TrackerStore::remove_if_present`], which is idempotent.

use std::collections::{BTreeSet, HashMap};

use crate::escalation::state::{Chain, TrackingKey};
use crate::ids::{ChannelId, UserId};

/// Result of an idempotent removal
#[derive(Debug)]
pub enum RemoveOutcome {
    Removed(Chain),
    /// Already cancelled or completed; not an error
    Absent,
}

impl RemoveOutcome {
    pub fn into_chain(self) -> Option<Chain> {
        match self {
            Self::Removed(chain) => Some(chain),
            Self::Absent => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct TrackerStore {
    chains: HashMap<TrackingKey, Chain>,
    by_owner: HashMap<UserId, BTreeSet<TrackingKey>>,
}

impl TrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chain, returning any chain previously stored under its key.
    ///
    /// Callers check [`contains`](Self::contains) first; a displaced chain
    /// still owns its timer and must be cancelled by the caller.
    pub fn put(&mut self, chain: Chain) -> Option<Chain> {
        let key = chain.key.clone();
        let owner = chain.owner_id.clone();
        let previous = self.chains.insert(key.clone(), chain);
        if let Some(prev) = &previous {
            if prev.owner_id != owner {
                self.unindex(&prev.owner_id, &key);
            }
        }
        self.by_owner.entry(owner).or_default().insert(key);
        previous
    }

    pub fn get(&self, key: &TrackingKey) -> Option<&Chain> {
        self.chains.get(key)
    }

    /// Mutable access. `owner_id` must not be changed through this reference.
    pub fn get_mut(&mut self, key: &TrackingKey) -> Option<&mut Chain> {
        self.chains.get_mut(key)
    }

    pub fn contains(&self, key: &TrackingKey) -> bool {
        self.chains.contains_key(key)
    }

    pub fn remove_if_present(&mut self, key: &TrackingKey) -> RemoveOutcome {
        match self.chains.remove(key) {
            Some(chain) => {
                self.unindex(&chain.owner_id, key);
                RemoveOutcome::Removed(chain)
            }
            None => RemoveOutcome::Absent,
        }
    }

    fn unindex(&mut self, owner: &UserId, key: &TrackingKey) {
        if let Some(keys) = self.by_owner.get_mut(owner) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }

    /// Keys of the owner's chains that fall under `channel`, in key order
    pub fn keys_for_owner_channel(&self, owner: &UserId, channel: &ChannelId) -> Vec<TrackingKey> {
        self.by_owner
            .get(owner)
            .map(|keys| {
                keys.iter()
                    .filter(|k| k.channel() == channel)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn chains_for_owner_channel(&self, owner: &UserId, channel: &ChannelId) -> Vec<&Chain> {
        self.keys_for_owner_channel(owner, channel)
            .iter()
            .filter_map(|k| self.chains.get(k))
            .collect()
    }

    /// Empty the store, handing every chain to the caller
    pub fn drain_all(&mut self) -> Vec<Chain> {
        self.by_owner.clear();
        self.chains.drain().map(|(_, chain)| chain).collect()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chains currently holding a timer
    pub fn pending_timer_count(&self) -> usize {
        self.chains
            .values()
            .filter(|c| c.pending_timer.is_some())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chain> {
        self.chains.values()
    }
}
