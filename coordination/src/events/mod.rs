//! Inbound events from the chat platform
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Adapter    │────▶│  WatchEvent  │────▶│   Service    │
//! │ feed/gateway │     │ (msg/react)  │     │  (one loop)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Events from automated accounts are carried through so the observer can
//! classify them, but they never start or cancel a chain.

pub mod types;

pub use types::{InboundMessage, InboundReaction, MessageLink, WatchEvent, STATS_COMMAND};
