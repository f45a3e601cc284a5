//! Escalation State — one tracked chain and its identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::events::MessageLink;
use crate::ids::{ChainId, ChannelId, MessageId, UserId};
use crate::timer::TimerId;

/// How chains are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One chain per channel; new messages are ignored while it is live
    Channel,
    /// One chain per customer message
    #[default]
    Message,
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "channel" => Ok(Self::Channel),
            "message" => Ok(Self::Message),
            _ => Err(ConfigError::InvalidValue {
                field: "granularity",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// Identity used to deduplicate and isolate chains
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum TrackingKey {
    Channel {
        channel: ChannelId,
    },
    Message {
        channel: ChannelId,
        message: MessageId,
    },
}

impl TrackingKey {
    pub fn new(granularity: Granularity, channel: &ChannelId, message: &MessageId) -> Self {
        match granularity {
            Granularity::Channel => Self::Channel {
                channel: channel.clone(),
            },
            Granularity::Message => Self::Message {
                channel: channel.clone(),
                message: message.clone(),
            },
        }
    }

    /// Channel this key falls under, for channel-scoped cancellation
    pub fn channel(&self) -> &ChannelId {
        match self {
            Self::Channel { channel } | Self::Message { channel, .. } => channel,
        }
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel { channel } => write!(f, "channel:{}", channel),
            Self::Message { channel, message } => write!(f, "message:{}/{}", channel, message),
        }
    }
}

/// Lifecycle of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Exactly one stage timer pending
    Active,
    /// A stage was dropped off-hours; no timer, waits for a responder
    Parked,
    /// Final tier notified
    Completed,
    /// A responder replied or reacted
    Cancelled,
}

impl ChainStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Parked => write!(f, "parked"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One tracked escalation for a customer message (or channel)
#[derive(Debug, Clone)]
pub struct Chain {
    pub id: ChainId,
    pub key: TrackingKey,
    /// Must not change while the chain is in a tracker store
    pub owner_id: UserId,
    /// Customer who sent the triggering message
    pub author_id: UserId,
    pub origin_link: MessageLink,
    /// Index into the owner's stage ladder; 0 is the owner alert
    pub stage: usize,
    pub pending_timer: Option<TimerId>,
    pub created_at: DateTime<Utc>,
    pub status: ChainStatus,
}

impl Chain {
    /// New chain at stage 0 with no timer armed yet
    pub fn new(
        key: TrackingKey,
        owner_id: UserId,
        author_id: UserId,
        origin_link: MessageLink,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChainId::new(),
            key,
            owner_id,
            author_id,
            origin_link,
            stage: 0,
            pending_timer: None,
            created_at,
            status: ChainStatus::Active,
        }
    }

    /// Install the next stage timer; returns a timer that was still pending,
    /// which callers must cancel.
    pub fn arm(&mut self, timer: TimerId) -> Option<TimerId> {
        self.status = ChainStatus::Active;
        self.pending_timer.replace(timer)
    }

    /// Consume the pending timer (it fired or is being cancelled)
    pub fn take_timer(&mut self) -> Option<TimerId> {
        self.pending_timer.take()
    }

    pub fn advance(&mut self) {
        self.stage += 1;
    }

    /// Stop without a timer until a responder clears the chain
    pub fn park(&mut self) {
        self.pending_timer = None;
        self.status = ChainStatus::Parked;
    }

    /// Time since the triggering message, clamped at zero
    pub fn elapsed(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "chain={} key={} owner={} author={} stage={} status={}",
            self.id, self.key, self.owner_id, self.author_id, self.stage, self.status,
        )
    }
}
