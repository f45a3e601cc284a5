//! Alert Latch — edge-triggered alert state persisted as `{ name: bool }`
//!
//! A level check ("is it broken right now?") becomes one message when the
//! condition starts and one when it clears, never a message per check.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub type AlertLatchResult<T> = Result<T, AlertLatchError>;

#[derive(Error, Debug)]
pub enum AlertLatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Edge reported by [`AlertLatch::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// false -> true
    Opened,
    /// true -> false
    Recovered,
}

#[derive(Debug, Clone, Default)]
pub struct AlertLatch {
    states: BTreeMap<String, bool>,
    path: Option<PathBuf>,
}

impl AlertLatch {
    /// Latch that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load latch state from `path`.
    ///
    /// A missing file is empty state. An unreadable or malformed file is also
    /// empty state, with a warning; it is replaced on the next save.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let states = match std::fs::read_to_string(&path) {
            Ok(text) => match parse_states(&text) {
                Ok(states) => states,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Alert state unreadable; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Alert state unreadable; starting empty");
                BTreeMap::new()
            }
        };
        Self {
            states,
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.states.get(name).copied().unwrap_or(false)
    }

    /// Record the current level for `name` and report an edge, if any
    pub fn observe(&mut self, name: &str, breached: bool) -> Option<AlertTransition> {
        let was_open = self.is_open(name);
        if was_open == breached {
            return None;
        }
        self.states.insert(name.to_string(), breached);
        Some(if breached {
            AlertTransition::Opened
        } else {
            AlertTransition::Recovered
        })
    }

    /// Write state atomically (temp file + rename). No-op for in-memory latches.
    pub fn save(&self) -> AlertLatchResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.states)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}

/// Non-boolean entries are skipped rather than failing the whole file
fn parse_states(text: &str) -> AlertLatchResult<BTreeMap<String, bool>> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(text)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| value.as_bool().map(|open| (name, open)))
        .collect())
}
