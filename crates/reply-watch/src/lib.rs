//! reply-watch: runtime pieces around the escalation engine
//!
//! The `reply-watch` binary wires these together: it reads NDJSON chat
//! events from stdin, feeds them to an [`reply_coordination::EscalationService`]
//! and delivers stage notifications through a [`sink`].

pub mod config;
pub mod feed;
pub mod report;
pub mod sink;
