//! Inbound event types
//!
//! These are the only shapes the escalation core accepts from the chat
//! platform adapter. The NDJSON feed deserializes straight into [`WatchEvent`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ChannelId, GuildId, MessageId, UserId};

/// Command text that requests the response-time report
pub const STATS_COMMAND: &str = "!avgtime";

/// A message posted in some channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub author_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub guild_id: GuildId,
    /// Bot and webhook accounts; always ignored
    #[serde(default)]
    pub is_automated: bool,
    /// Message text, only inspected for the stats command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl InboundMessage {
    pub fn new(
        author_id: impl Into<UserId>,
        channel_id: impl Into<ChannelId>,
        message_id: impl Into<MessageId>,
        guild_id: impl Into<GuildId>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            guild_id: guild_id.into(),
            is_automated: false,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn automated(mut self) -> Self {
        self.is_automated = true;
        self
    }

    /// Whether this message is the `!avgtime` report request
    pub fn is_stats_command(&self) -> bool {
        self.content
            .as_deref()
            .is_some_and(|c| c.trim() == STATS_COMMAND)
    }

    /// Permanent link to this message
    pub fn link(&self, host: &str) -> MessageLink {
        MessageLink::new(host, &self.guild_id, &self.channel_id, &self.message_id)
    }
}

/// A reaction added to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundReaction {
    pub actor_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    #[serde(default)]
    pub is_automated: bool,
}

impl InboundReaction {
    pub fn new(
        actor_id: impl Into<UserId>,
        channel_id: impl Into<ChannelId>,
        message_id: impl Into<MessageId>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            is_automated: false,
        }
    }
}

/// Everything the watcher can be fed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    Message(InboundMessage),
    Reaction(InboundReaction),
    /// Explicit request for the response-time report
    Stats,
}

impl WatchEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Reaction(_) => "reaction",
            Self::Stats => "stats",
        }
    }
}

/// Permanent `https://<host>/channels/<guild>/<channel>/<message>` link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLink(String);

impl MessageLink {
    pub fn new(host: &str, guild: &GuildId, channel: &ChannelId, message: &MessageId) -> Self {
        Self(format!(
            "https://{}/channels/{}/{}/{}",
            host.trim_end_matches('/'),
            guild,
            channel,
            message
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
