//! NDJSON event feed
//!
//! One [`WatchEvent`] per line, e.g.
//!
//! ```text
//! {"type":"message","author_id":"42","channel_id":"7","message_id":"99","guild_id":"1"}
//! {"type":"reaction","actor_id":"11","channel_id":"7","message_id":"99"}
//! {"type":"stats"}
//! ```
//!
//! Blank lines are skipped. Malformed lines are logged and skipped; a bad
//! line never stops the feed.

use anyhow::{Context, Result};
use reply_coordination::{EventOutcome, ServiceError, ServiceHandle, WatchEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Counters for one feed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub lines: usize,
    pub events: usize,
    pub skipped: usize,
}

/// Parse one line. `None` for blank lines.
pub fn parse_line(line: &str) -> Option<Result<WatchEvent, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Submit every event from `reader` until EOF or until the service stops.
///
/// `on_outcome` sees each event's outcome as soon as it has been applied.
pub async fn pump<R, F>(reader: R, handle: &ServiceHandle, mut on_outcome: F) -> Result<FeedSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&EventOutcome),
{
    let mut summary = FeedSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read event feed")? {
        summary.lines += 1;
        let event = match parse_line(&line) {
            None => continue,
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                summary.skipped += 1;
                warn!(line = summary.lines, error = %e, "Skipping malformed event");
                continue;
            }
        };

        let kind = event.event_type();
        match handle.submit(event).await {
            Ok(outcome) => {
                summary.events += 1;
                debug!(line = summary.lines, kind, outcome = ?outcome, "Event applied");
                on_outcome(&outcome);
            }
            Err(ServiceError::Stopped) => {
                warn!(line = summary.lines, "Escalation service stopped; ending feed");
                break;
            }
        }
    }

    Ok(summary)
}
