//! Response-time statistics per owner
//!
//! Written only by the reply observer when a responder clears a chain.
//! Readers take a copy of the numeric fields; the mean is always derived
//! from `total / count` of the same copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::ids::UserId;

/// Shared reference to ResponseStats
pub type SharedResponseStats = Arc<ResponseStats>;

/// Running aggregate for one owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseSample {
    pub total: Duration,
    pub count: u64,
}

impl ResponseSample {
    /// Mean response time, `None` before the first sample
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// Per-owner response-time aggregates
#[derive(Debug, Default)]
pub struct ResponseStats {
    samples: Mutex<HashMap<UserId, ResponseSample>>,
}

impl ResponseStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this aggregate
    pub fn shared(self) -> SharedResponseStats {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, ResponseSample>> {
        // Every update is a single add; a poisoned map is still consistent
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add one response-time sample and return the updated aggregate
    pub fn record(&self, owner: &UserId, elapsed: Duration) -> ResponseSample {
        let mut samples = self.lock();
        let sample = samples.entry(owner.clone()).or_default();
        sample.total = sample.total.saturating_add(elapsed);
        sample.count += 1;
        *sample
    }

    pub fn snapshot(&self, owner: &UserId) -> Option<ResponseSample> {
        self.lock().get(owner).copied()
    }

    /// Copy of every owner's aggregate, ordered by owner id
    pub fn snapshot_all(&self) -> Vec<(UserId, ResponseSample)> {
        let mut all: Vec<_> = self
            .lock()
            .iter()
            .map(|(owner, sample)| (owner.clone(), *sample))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
