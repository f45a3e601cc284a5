//! Error types for configuration and notification delivery
//!
//! Configuration errors are fatal at startup. Delivery errors are logged by
//! the engine and never stop a chain from advancing.

use std::path::PathBuf;
use thiserror::Error;

use crate::ids::{ChannelId, UserId};

/// Result type alias for configuration loading and policy validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that make a watcher configuration unusable
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or does not match the schema
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Time of day not in HH:MM form
    #[error("Invalid time of day '{value}' (expected HH:MM)")]
    InvalidTime { value: String },

    /// Not an IANA timezone name
    #[error("Unknown timezone '{value}'")]
    InvalidTimezone { value: String },

    /// Enum-like setting with an unrecognised value
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },

    /// Two owners claim the same channel
    #[error("Channel {channel} is claimed by both owner {first} and owner {second}")]
    DuplicateChannel {
        channel: ChannelId,
        first: UserId,
        second: UserId,
    },

    /// The same owner id appears in two owner entries
    #[error("Owner {owner} is configured more than once")]
    DuplicateOwner { owner: UserId },

    /// A tier with nobody to notify
    #[error("Owner {owner} tier {tier} has no targets")]
    EmptyTier { owner: UserId, tier: usize },

    /// Stage delays must cover the owner stage plus every tier
    #[error("Owner {owner} has {delays} stage delays for {tiers} tiers (expected {expected})")]
    StageDelayMismatch {
        owner: UserId,
        delays: usize,
        tiers: usize,
        expected: usize,
    },

    /// Owner without any watched channel
    #[error("Owner {owner} watches no channels")]
    NoChannels { owner: UserId },

    /// Owner without any escalation tier
    #[error("Owner {owner} has no escalation tiers")]
    NoTiers { owner: UserId },
}

/// Failure to deliver one notification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Target cannot be reached (DMs closed, unknown user)
    #[error("Target {target} unreachable: {reason}")]
    Unreachable { target: UserId, reason: String },

    /// Relay answered with a non-success status
    #[error("Delivery to {target} rejected with status {status}")]
    Rejected { target: UserId, status: u16 },

    /// Network or encoding failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),
}
