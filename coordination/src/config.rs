//! Watch configuration — one TOML document, optional env overrides
//!
//! ```toml
//! [engine]
//! granularity = "message"        # or "channel"
//! link_host = "discord.com"
//! track_response_times = true
//! off_hours = "drop"             # or "defer"
//!
//! [availability]                 # omit to deliver at any hour
//! start = "09:00"
//! end = "17:00"
//! timezone = "America/New_York"
//!
//! [[owners]]
//! id = "111"
//! channels = ["222", "333"]
//! stage_delays_ms = [60000, 30000, 10000]
//! tiers = [{ targets = ["111"] }, { targets = ["444", "555"] }]
//! ```
//!
//! Loading always ends in policy validation, so a `WatchConfig` in hand is
//! safe to run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::availability::{AvailabilityWindow, OffHoursPolicy};
use crate::error::{ConfigError, ConfigResult};
use crate::escalation::state::Granularity;
use crate::ids::{ChannelId, UserId};
use crate::policy::{EscalationPolicy, Owner, Tier};

pub const ENV_GRANULARITY: &str = "REPLY_WATCH_GRANULARITY";
pub const ENV_LINK_HOST: &str = "REPLY_WATCH_LINK_HOST";
pub const ENV_TRACK_RESPONSE_TIMES: &str = "REPLY_WATCH_TRACK_RESPONSE_TIMES";
pub const ENV_OFF_HOURS: &str = "REPLY_WATCH_OFF_HOURS";

/// Default host for permanent message links
pub const DEFAULT_LINK_HOST: &str = "discord.com";

/// Engine feature switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub granularity: Granularity,
    pub link_host: String,
    /// Record `now - created_at` for every responder cancellation
    pub track_response_times: bool,
    pub off_hours: OffHoursPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            link_host: DEFAULT_LINK_HOST.to_string(),
            track_response_times: true,
            off_hours: OffHoursPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    engine: EngineConfig,
    availability: Option<RawAvailability>,
    #[serde(default)]
    owners: Vec<RawOwner>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAvailability {
    start: String,
    end: String,
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOwner {
    id: UserId,
    channels: Vec<ChannelId>,
    stage_delays_ms: Vec<u64>,
    tiers: Vec<Tier>,
}

impl From<RawOwner> for Owner {
    fn from(raw: RawOwner) -> Self {
        Owner::new(
            raw.id,
            raw.channels,
            raw.tiers,
            raw.stage_delays_ms
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        )
    }
}

/// Fully validated runtime configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub engine: EngineConfig,
    /// `None` disables the availability gate
    pub availability: Option<AvailabilityWindow>,
    pub policy: EscalationPolicy,
}

impl WatchConfig {
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(input)?;
        let availability = raw
            .availability
            .map(|a| AvailabilityWindow::parse(&a.start, &a.end, &a.timezone))
            .transpose()?;
        let policy = EscalationPolicy::new(raw.owners.into_iter().map(Owner::from).collect())?;
        Ok(Self {
            engine: raw.engine,
            availability,
            policy,
        })
    }

    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(
            path = %path.display(),
            owners = config.policy.owners().len(),
            channels = config.policy.watched_channel_count(),
            "Loaded watch config"
        );
        Ok(config)
    }

    /// Apply `REPLY_WATCH_*` overrides from the process environment.
    ///
    /// `REPLY_WATCH_TRACK_RESPONSE_TIMES` accepts "1", "true", or "yes"
    /// (case-insensitive) as enabled; any other value disables it.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup; tests use this to avoid
    /// racing on the shared process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_GRANULARITY) {
            self.engine.granularity = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LINK_HOST) {
            let host = v.trim();
            if host.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "link_host",
                    value: v,
                });
            }
            self.engine.link_host = host.to_string();
        }
        if let Some(v) = lookup(ENV_TRACK_RESPONSE_TIMES) {
            self.engine.track_response_times = parse_bool_value(&v);
        }
        if let Some(v) = lookup(ENV_OFF_HOURS) {
            self.engine.off_hours = v.parse()?;
        }
        Ok(())
    }
}

/// Accepts "1", "true", or "yes" (case-insensitive).
fn parse_bool_value(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "1" || v == "true" || v == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[engine]
granularity = "channel"
off_hours = "defer"

[availability]
start = "09:00"
end = "17:00"
timezone = "America/New_York"

[[owners]]
id = "o1"
channels = ["c1", "c2"]
stage_delays_ms = [60000, 30000, 10000]
tiers = [{ targets = ["o1"] }, { targets = ["m1", "senior"] }]
"#;

    #[test]
    fn test_parse_sample() {
        let config = WatchConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.engine.granularity, Granularity::Channel);
        assert_eq!(config.engine.off_hours, OffHoursPolicy::Defer);
        assert_eq!(config.engine.link_host, "discord.com");
        assert!(config.engine.track_response_times);

        let window = config.availability.unwrap();
        assert_eq!(window.timezone(), chrono_tz::America::New_York);

        let owner = config.policy.owner(&UserId::from("o1")).unwrap();
        assert_eq!(owner.stage_count(), 3);
        assert_eq!(owner.delay_for_stage(2), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_defaults_without_engine_section() {
        let config = WatchConfig::from_toml_str(
            r#"
[[owners]]
id = "o1"
channels = ["c1"]
stage_delays_ms = [1000, 2000]
tiers = [{ targets = ["m1"] }]
"#,
        )
        .unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.granularity, Granularity::Message);
        assert!(config.availability.is_none());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let bad_tz = SAMPLE.replace("America/New_York", "Mars/Olympus");
        assert!(matches!(
            WatchConfig::from_toml_str(&bad_tz).unwrap_err(),
            ConfigError::InvalidTimezone { .. }
        ));

        let bad_delays = SAMPLE.replace("[60000, 30000, 10000]", "[60000]");
        assert!(matches!(
            WatchConfig::from_toml_str(&bad_delays).unwrap_err(),
            ConfigError::StageDelayMismatch { .. }
        ));

        let bad_enum = SAMPLE.replace("\"channel\"", "\"thread\"");
        assert!(matches!(
            WatchConfig::from_toml_str(&bad_enum).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = WatchConfig::from_toml_str(SAMPLE).unwrap();
        let vars: HashMap<&str, &str> = [
            (ENV_GRANULARITY, "message"),
            (ENV_LINK_HOST, "ptb.discord.com"),
            (ENV_TRACK_RESPONSE_TIMES, "no"),
            (ENV_OFF_HOURS, "drop"),
        ]
        .into_iter()
        .collect();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.engine.granularity, Granularity::Message);
        assert_eq!(config.engine.link_host, "ptb.discord.com");
        assert!(!config.engine.track_response_times);
        assert_eq!(config.engine.off_hours, OffHoursPolicy::Drop);
    }

    #[test]
    fn test_bad_override_is_error() {
        let mut config = WatchConfig::from_toml_str(SAMPLE).unwrap();
        let err = config
            .apply_overrides_from(|k| (k == ENV_OFF_HOURS).then(|| "later".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "off_hours", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = WatchConfig::load(file.path()).unwrap();
        assert_eq!(config.policy.watched_channel_count(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WatchConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_bool_value() {
        assert!(parse_bool_value("1"));
        assert!(parse_bool_value("YES"));
        assert!(parse_bool_value(" true "));
        assert!(!parse_bool_value("0"));
        assert!(!parse_bool_value(""));
    }
}
