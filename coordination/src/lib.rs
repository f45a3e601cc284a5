//! Reply Watch Coordination Library
//!
//! Escalation core for chat-support channels: watches for customer messages
//! nobody has answered and walks a ladder of reminders up to managers until a
//! responder replies or reacts.
//!
//! # Components
//!
//! - [`policy`]: who owns which channels, tiers and stage delays
//! - [`escalation`]: tracker store, reply observer and the stage state machine
//! - [`availability`]: business-hours gate for notification delivery
//! - [`stats`]: per-owner response-time aggregates (`!avgtime`)
//! - [`timer`] / [`clock`]: cancellable scheduling and wall time
//! - [`service`]: the single-task event loop that serialises everything
//! - [`alert`]: edge-triggered alert latch persisted as JSON
//!
//! # Usage
//!
//! ```no_run
//! use reply_coordination::{
//!     EscalationEngine, EscalationService, SystemClock, TokioTimers, WatchConfig,
//! };
//! # use reply_coordination::{NotificationSink, DeliveryError, UserId};
//! # struct Sink;
//! # #[async_trait::async_trait]
//! # impl NotificationSink for Sink {
//! #     async fn send(&self, _: &UserId, _: &str) -> Result<(), DeliveryError> { Ok(()) }
//! # }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatchConfig::load("reply-watch.toml")?;
//! let (timers, timer_rx) = TokioTimers::new();
//! let engine = EscalationEngine::new(
//!     config.policy.shared(),
//!     config.engine,
//!     Sink,
//!     timers,
//!     SystemClock,
//! );
//! let (handle, task) = EscalationService::spawn(engine, timer_rx);
//! handle.shutdown().await?;
//! task.await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod alert;
pub mod availability;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod events;
pub mod ids;
pub mod notify;
pub mod policy;
pub mod service;
pub mod stats;
pub mod timer;

pub use alert::{AlertLatch, AlertLatchError, AlertTransition};
pub use availability::{AvailabilityWindow, OffHoursPolicy};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{EngineConfig, WatchConfig};
pub use error::{ConfigError, ConfigResult, DeliveryError};
pub use escalation::{
    CancelledChain, Chain, ChainStatus, EscalationEngine, Granularity, IgnoreReason,
    MessageOutcome, ReactionOutcome, StageOutcome, TrackerStore, TrackingKey,
};
pub use events::{InboundMessage, InboundReaction, MessageLink, WatchEvent};
pub use ids::{ChainId, ChannelId, GuildId, MessageId, UserId};
pub use notify::{Notice, NoticeKind, NotificationSink};
pub use policy::{EscalationPolicy, Owner, SharedPolicy, Tier};
pub use service::{EscalationService, EventOutcome, ServiceError, ServiceHandle};
pub use stats::{ResponseSample, ResponseStats, SharedResponseStats};
pub use timer::{TimerFired, TimerId, TimerService, TokioTimers};
