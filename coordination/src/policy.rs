//! Escalation Policy — who owns which channels and who hears about silence
//!
//! Each [`Owner`] watches a set of channels. A customer message in one of
//! those channels walks the owner's stage ladder until somebody responds:
//!
//! ```text
//! customer message
//!     │
//!     ├─ stage_delays[0] ──▶ owner             (first alert)
//!     ├─ stage_delays[1] ──▶ tiers[0]          (reminder / manager)
//!     │        ...
//!     └─ stage_delays[n] ──▶ tiers[n-1]        (final; chain completes)
//! ```
//!
//! The policy is validated once at load and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::ids::{ChannelId, UserId};

/// Shared reference to a validated policy
pub type SharedPolicy = Arc<EscalationPolicy>;

/// One escalation step's recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub targets: Vec<UserId>,
}

impl Tier {
    pub fn new<I, U>(targets: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.targets.contains(user)
    }
}

/// The primary responsible identity for a set of channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub id: UserId,
    pub channels: Vec<ChannelId>,
    /// Recipients for stages 1..=n
    pub tiers: Vec<Tier>,
    /// One delay per stage; stage 0 is the owner alert
    pub stage_delays: Vec<Duration>,
}

impl Owner {
    pub fn new(
        id: impl Into<UserId>,
        channels: Vec<ChannelId>,
        tiers: Vec<Tier>,
        stage_delays: Vec<Duration>,
    ) -> Self {
        Self {
            id: id.into(),
            channels,
            tiers,
            stage_delays,
        }
    }

    /// Number of stages (owner alert plus one per tier)
    pub fn stage_count(&self) -> usize {
        self.tiers.len() + 1
    }

    /// Index of the stage that completes the chain
    pub fn final_stage(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_final_stage(&self, stage: usize) -> bool {
        stage >= self.final_stage()
    }

    /// Recipients for a stage; stage 0 is always the owner alone
    pub fn targets_for_stage(&self, stage: usize) -> Option<&[UserId]> {
        if stage == 0 {
            return Some(slice::from_ref(&self.id));
        }
        self.tiers.get(stage - 1).map(|t| t.targets.as_slice())
    }

    pub fn delay_for_stage(&self, stage: usize) -> Option<Duration> {
        self.stage_delays.get(stage).copied()
    }

    pub fn watches(&self, channel: &ChannelId) -> bool {
        self.channels.contains(channel)
    }

    /// Owner identity or a member of any tier. Responders never start chains
    /// and their replies cancel them.
    pub fn is_responder(&self, user: &UserId) -> bool {
        self.id == *user || self.tiers.iter().any(|t| t.contains(user))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels {
                owner: self.id.clone(),
            });
        }
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers {
                owner: self.id.clone(),
            });
        }
        if let Some(tier) = self.tiers.iter().position(|t| t.targets.is_empty()) {
            return Err(ConfigError::EmptyTier {
                owner: self.id.clone(),
                tier,
            });
        }
        if self.stage_delays.len() != self.stage_count() {
            return Err(ConfigError::StageDelayMismatch {
                owner: self.id.clone(),
                delays: self.stage_delays.len(),
                tiers: self.tiers.len(),
                expected: self.stage_count(),
            });
        }
        Ok(())
    }
}

/// Validated, immutable owner table
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    owners: Vec<Owner>,
    channel_index: HashMap<ChannelId, usize>,
    owner_index: HashMap<UserId, usize>,
}

impl EscalationPolicy {
    /// Validate and index an owner table.
    ///
    /// Ambiguous ownership is rejected rather than resolved first-match-wins.
    pub fn new(owners: Vec<Owner>) -> ConfigResult<Self> {
        let mut channel_index = HashMap::new();
        let mut owner_index = HashMap::new();

        for (idx, owner) in owners.iter().enumerate() {
            owner.validate()?;

            if owner_index.insert(owner.id.clone(), idx).is_some() {
                return Err(ConfigError::DuplicateOwner {
                    owner: owner.id.clone(),
                });
            }

            let mut seen = HashSet::new();
            for channel in &owner.channels {
                if !seen.insert(channel) {
                    continue;
                }
                if let Some(prev) = channel_index.insert(channel.clone(), idx) {
                    return Err(ConfigError::DuplicateChannel {
                        channel: channel.clone(),
                        first: owners[prev].id.clone(),
                        second: owner.id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            owners,
            channel_index,
            owner_index,
        })
    }

    /// Create a shared reference to this policy
    pub fn shared(self) -> SharedPolicy {
        Arc::new(self)
    }

    pub fn owners(&self) -> &[Owner] {
        &self.owners
    }

    pub fn owner_for_channel(&self, channel: &ChannelId) -> Option<&Owner> {
        self.channel_index.get(channel).map(|&idx| &self.owners[idx])
    }

    pub fn owner(&self, id: &UserId) -> Option<&Owner> {
        self.owner_index.get(id).map(|&idx| &self.owners[idx])
    }

    pub fn watched_channel_count(&self) -> usize {
        self.channel_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    fn owner(id: &str, channels: &[&str]) -> Owner {
        Owner::new(
            id,
            channels.iter().map(|c| ChannelId::from(*c)).collect(),
            vec![Tier::new([id]), Tier::new(["m1", "senior"])],
            secs(&[60, 30, 10]),
        )
    }

    #[test]
    fn test_stage_targets() {
        let o = owner("o1", &["c1"]);
        assert_eq!(o.stage_count(), 3);
        assert_eq!(o.final_stage(), 2);
        assert_eq!(o.targets_for_stage(0).unwrap(), &[UserId::from("o1")]);
        assert_eq!(o.targets_for_stage(1).unwrap(), &[UserId::from("o1")]);
        assert_eq!(
            o.targets_for_stage(2).unwrap(),
            &[UserId::from("m1"), UserId::from("senior")]
        );
        assert!(o.targets_for_stage(3).is_none());
        assert_eq!(o.delay_for_stage(1), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_responders() {
        let o = owner("o1", &["c1"]);
        assert!(o.is_responder(&UserId::from("o1")));
        assert!(o.is_responder(&UserId::from("senior")));
        assert!(!o.is_responder(&UserId::from("customer")));
    }

    #[test]
    fn test_channel_lookup() {
        let policy = EscalationPolicy::new(vec![
            owner("o1", &["c1", "c2"]),
            owner("o2", &["c3"]),
        ])
        .unwrap();
        assert_eq!(policy.watched_channel_count(), 3);
        assert_eq!(
            policy.owner_for_channel(&ChannelId::from("c3")).unwrap().id,
            UserId::from("o2")
        );
        assert!(policy.owner_for_channel(&ChannelId::from("c9")).is_none());
        assert!(policy.owner(&UserId::from("o1")).is_some());
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let err = EscalationPolicy::new(vec![owner("o1", &["c1"]), owner("o2", &["c1"])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateChannel { .. }));
    }

    #[test]
    fn test_repeated_channel_within_owner_allowed() {
        assert!(EscalationPolicy::new(vec![owner("o1", &["c1", "c1"])]).is_ok());
    }

    #[test]
    fn test_duplicate_owner_rejected() {
        let err = EscalationPolicy::new(vec![owner("o1", &["c1"]), owner("o1", &["c2"])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOwner { .. }));
    }

    #[test]
    fn test_empty_tier_rejected() {
        let mut o = owner("o1", &["c1"]);
        o.tiers[1] = Tier::new(Vec::<UserId>::new());
        let err = EscalationPolicy::new(vec![o]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTier { tier: 1, .. }));
    }

    #[test]
    fn test_delay_count_must_match_tiers() {
        let mut o = owner("o1", &["c1"]);
        o.stage_delays = secs(&[60, 30]);
        let err = EscalationPolicy::new(vec![o]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::StageDelayMismatch {
                delays: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_owner_without_channels_or_tiers_rejected() {
        let o = owner("o1", &[]);
        assert!(matches!(
            EscalationPolicy::new(vec![o]).unwrap_err(),
            ConfigError::NoChannels { .. }
        ));

        let o = Owner::new("o1", vec![ChannelId::from("c1")], vec![], secs(&[60]));
        assert!(matches!(
            EscalationPolicy::new(vec![o]).unwrap_err(),
            ConfigError::NoTiers { .. }
        ));
    }
}
