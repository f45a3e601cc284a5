//! Shared fixtures for the escalation integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reply_coordination::{
    ChannelId, DeliveryError, EngineConfig, EscalationEngine, EscalationPolicy, EscalationService,
    Granularity, InboundMessage, InboundReaction, NotificationSink, Owner, ServiceHandle,
    SharedPolicy, Tier, TimerFired, TokioClock, TokioTimers, UserId, WatchEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One delivered notification, stamped with paused-clock time since setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub at: Duration,
    pub target: UserId,
    pub text: String,
}

/// Sink that records every send; targets listed in `unreachable` fail
#[derive(Clone)]
pub struct RecordingSink {
    started: Instant,
    sent: Arc<Mutex<Vec<Sent>>>,
    unreachable: Arc<Vec<UserId>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::failing_for(&[])
    }

    pub fn failing_for(targets: &[&str]) -> Self {
        Self {
            started: Instant::now(),
            sent: Arc::new(Mutex::new(Vec::new())),
            unreachable: Arc::new(targets.iter().map(|t| UserId::from(*t)).collect()),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// `(seconds since setup, target)` for every send, in order
    pub fn timeline(&self) -> Vec<(u64, String)> {
        self.sent()
            .into_iter()
            .map(|s| (s.at.as_secs(), s.target.to_string()))
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, target: &UserId, text: &str) -> Result<(), DeliveryError> {
        if self.unreachable.contains(target) {
            return Err(DeliveryError::Unreachable {
                target: target.clone(),
                reason: "cannot send messages to this user".into(),
            });
        }
        self.sent.lock().unwrap().push(Sent {
            at: self.started.elapsed(),
            target: target.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Owner `O` watches `C1`; tiers `[{O}, {M1, Senior}]`; delays 60s/30s/10s.
/// Alerts O at 60s, reminds O at 90s, escalates to M1 and Senior at 100s.
pub fn scenario_policy() -> SharedPolicy {
    EscalationPolicy::new(vec![
        Owner::new(
            "O",
            vec![ChannelId::from("C1"), ChannelId::from("C2")],
            vec![Tier::new(["O"]), Tier::new(["M1", "Senior"])],
            vec![
                Duration::from_secs(60),
                Duration::from_secs(30),
                Duration::from_secs(10),
            ],
        ),
        Owner::new(
            "P",
            vec![ChannelId::from("C9")],
            vec![Tier::new(["M2"])],
            vec![Duration::from_secs(60), Duration::from_secs(60)],
        ),
    ])
    .unwrap()
    .shared()
}

pub fn config(granularity: Granularity) -> EngineConfig {
    EngineConfig {
        granularity,
        ..EngineConfig::default()
    }
}

pub type TestEngine = EscalationEngine<RecordingSink, TokioTimers, TokioClock>;

pub fn engine_at(
    config: EngineConfig,
    sink: RecordingSink,
    wall: DateTime<Utc>,
) -> (TestEngine, UnboundedReceiver<TimerFired>) {
    let (timers, rx) = TokioTimers::new();
    let engine = EscalationEngine::new(
        scenario_policy(),
        config,
        sink,
        timers,
        TokioClock::anchored_at(wall),
    );
    (engine, rx)
}

pub fn spawn(engine: TestEngine, rx: UnboundedReceiver<TimerFired>) -> (ServiceHandle, JoinHandle<()>) {
    EscalationService::spawn(engine, rx)
}

/// A weekday at 10:00 in New York (inside business hours)
pub fn business_hours() -> DateTime<Utc> {
    utc("2026-01-15T15:00:00Z")
}

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn customer(author: &str, channel: &str, message: &str) -> WatchEvent {
    WatchEvent::Message(InboundMessage::new(author, channel, message, "G1"))
}

pub fn reply(author: &str, channel: &str, message: &str) -> WatchEvent {
    WatchEvent::Message(InboundMessage::new(author, channel, message, "G1"))
}

pub fn reaction(actor: &str, channel: &str, message: &str) -> WatchEvent {
    WatchEvent::Reaction(InboundReaction::new(actor, channel, message))
}

pub async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Let spawned timer tasks and the service loop run without moving time
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
