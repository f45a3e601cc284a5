//! Escalation — Deterministic State Machine for Unanswered Messages
//!
//! A customer message in a watched channel starts a chain. Each stage fires
//! after its configured delay unless a responder speaks first.
//!
//! # Stage Ladder
//!
//! ```text
//! customer message (qualifying)
//!     │
//!     ▼
//! Stage 0 — owner alert            after stage_delays[0]
//!     │
//!     ├─ owner / tier member replies or reacts → cancel (all chains in channel)
//!     ├─ fired off-hours, drop policy         → park (no timer, still cancellable)
//!     ├─ fired off-hours, defer policy        → re-arm at next window opening
//!     │
//!     ▼
//! Stage 1..n-1 — tiers[0..n-2]     after stage_delays[i]
//!     │  reminder if the tier is the owner, escalation otherwise
//!     │
//!     ▼
//! Stage n — tiers[n-1]             every target notified → chain completed
//! ```
//!
//! Delivery failures are logged and never stall the ladder.

pub mod engine;
pub mod observer;
pub mod state;
pub mod tracker;

pub use engine::{EscalationEngine, MessageOutcome, ReactionOutcome, StageOutcome};
pub use observer::{CancelledChain, Classification, IgnoreReason, ReplyObserver};
pub use state::{Chain, ChainStatus, Granularity, TrackingKey};
pub use tracker::{RemoveOutcome, TrackerStore};
