use anyhow::{bail, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_CONFIG: &str = "REPLY_WATCH_CONFIG";
pub const ENV_WEBHOOK_URL: &str = "REPLY_WATCH_WEBHOOK_URL";
pub const ENV_SINK: &str = "REPLY_WATCH_SINK";

const DEFAULT_CONFIG_PATH: &str = "reply-watch.toml";

/// Where stage notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SinkKind {
    /// Log every notification; deliver nothing
    #[default]
    Log,
    /// POST each notification to a relay webhook
    Webhook,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "webhook" => Ok(Self::Webhook),
            other => bail!("Unknown sink '{other}' (expected log or webhook)"),
        }
    }
}

/// Process-level settings: which config file, which sink.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub config_path: PathBuf,
    pub sink: SinkKind,
    pub webhook_url: Option<String>,
    /// Persisted relay-health latch (None = in memory)
    pub alert_state: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_path: std::env::var(ENV_CONFIG)
                .map(PathBuf::from)
                .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
            sink: std::env::var(ENV_SINK)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            webhook_url: std::env::var(ENV_WEBHOOK_URL).ok().filter(|v| !v.is_empty()),
            alert_state: None,
        }
    }
}

impl RuntimeConfig {
    /// A webhook sink needs somewhere to post.
    pub fn validate(&self) -> Result<()> {
        if self.sink == SinkKind::Webhook && self.webhook_url.is_none() {
            bail!("--sink webhook requires --webhook-url or {ENV_WEBHOOK_URL}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_kind_parse() {
        assert_eq!("Webhook".parse::<SinkKind>().unwrap(), SinkKind::Webhook);
        assert_eq!(" log ".parse::<SinkKind>().unwrap(), SinkKind::Log);
        assert!("email".parse::<SinkKind>().is_err());
    }

    #[test]
    fn test_webhook_requires_url() {
        let config = RuntimeConfig {
            config_path: "x.toml".into(),
            sink: SinkKind::Webhook,
            webhook_url: None,
            alert_state: None,
        };
        assert!(config.validate().is_err());

        let config = RuntimeConfig {
            webhook_url: Some("http://localhost:5678/webhook/escalation".into()),
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
