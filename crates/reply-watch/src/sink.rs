//! Notification sinks
//!
//! - [`LogSink`]: writes each notice to the log and reports success
//! - [`WebhookSink`]: POSTs `{"target": .., "content": ..}` to a relay (an
//!   n8n or bot-gateway webhook that turns it into a DM)
//!
//! The webhook sink tracks relay health through an [`AlertLatch`], so an
//! outage is reported once when it starts and once when it clears.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reply_coordination::{AlertLatch, AlertTransition, DeliveryError, NotificationSink, UserId};
use serde::Serialize;
use tracing::{info, warn};

/// Latch name for relay reachability
pub const RELAY_ALERT: &str = "relay";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Logs notifications instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, target: &UserId, text: &str) -> Result<(), DeliveryError> {
        info!(recipient = %target, text, "Notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    target: &'a str,
    content: &'a str,
}

/// Delivers notifications through an HTTP relay
#[derive(Debug)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
    latch: Mutex<AlertLatch>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            latch: Mutex::new(AlertLatch::in_memory()),
        })
    }

    /// Use a (possibly persisted) latch for relay-health alerts.
    pub fn with_alert_latch(mut self, latch: AlertLatch) -> Self {
        self.latch = Mutex::new(latch);
        self
    }

    /// Whether the relay is currently considered down.
    pub fn relay_down(&self) -> bool {
        self.latch
            .lock()
            .map(|latch| latch.is_open(RELAY_ALERT))
            .unwrap_or(false)
    }

    async fn observe_relay(&self, breached: bool) {
        let snapshot = {
            let Ok(mut latch) = self.latch.lock() else {
                return;
            };
            let Some(transition) = latch.observe(RELAY_ALERT, breached) else {
                return;
            };
            match transition {
                AlertTransition::Opened => warn!(url = %self.url, "Notification relay is failing"),
                AlertTransition::Recovered => {
                    info!(url = %self.url, "Notification relay recovered")
                }
            }
            latch.clone()
        };

        // Write off the runtime threads; the lock is already released
        match tokio::task::spawn_blocking(move || snapshot.save()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to persist relay alert state"),
            Err(e) => warn!(error = %e, "Relay alert state writer panicked"),
        }
    }

    async fn post(&self, target: &UserId, text: &str) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            target: target.as_str(),
            content: text,
        };
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected {
                target: target.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, target: &UserId, text: &str) -> Result<(), DeliveryError> {
        let result = self.post(target, text).await;
        // A 4xx means the relay is up but refused this one target
        let relay_failed = match &result {
            Ok(()) => false,
            Err(DeliveryError::Rejected { status, .. }) => *status >= 500,
            Err(_) => true,
        };
        self.observe_relay(relay_failed).await;
        result
    }
}
