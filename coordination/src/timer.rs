//! Cancellable delayed callbacks
//!
//! A fired timer is not a closure: it is a [`TimerFired`] message delivered
//! to the service loop, which hands it to the engine. That keeps all chain
//! mutation on one logical thread.
//!
//! Cancellation is race-free in two layers:
//! 1. `cancel` removes the id from the live set under the same lock a waking
//!    task must take before it may deliver, then aborts the task.
//! 2. The engine ignores any fire whose id is not the chain's current
//!    pending timer, which covers a fire already queued before the cancel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::escalation::state::TrackingKey;

/// Handle of one scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Delivered when a scheduled delay elapses without cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub key: TrackingKey,
}

/// Scheduling primitive the engine depends on
pub trait TimerService: Send + Sync {
    /// Arm a timer that delivers `TimerFired { id, key }` after `delay`
    fn schedule_after(&self, delay: Duration, key: TrackingKey) -> TimerId;

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    fn cancel(&self, id: TimerId) -> bool;

    /// Number of timers scheduled and not yet fired or cancelled
    fn armed(&self) -> usize;

    /// Cancel every pending timer, returning how many were live
    fn cancel_all(&self) -> usize;
}

/// Tokio-backed timers: one sleeping task per pending timer
pub struct TokioTimers {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_id: AtomicU64,
    live: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

fn lock_live(
    live: &Mutex<HashMap<TimerId, AbortHandle>>,
) -> MutexGuard<'_, HashMap<TimerId, AbortHandle>> {
    live.lock().unwrap_or_else(|e| e.into_inner())
}

impl TokioTimers {
    /// Create the service and the receiver the service loop drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: AtomicU64::new(1),
                live: Arc::new(Mutex::new(HashMap::new())),
            },
            rx,
        )
    }
}

impl TimerService for TokioTimers {
    fn schedule_after(&self, delay: Duration, key: TrackingKey) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let live = Arc::clone(&self.live);
        let tx = self.tx.clone();
        let deadline = Instant::now() + delay;

        // Register before the task can possibly wake and look itself up
        let mut guard = lock_live(&self.live);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let still_armed = lock_live(&live).remove(&id).is_some();
            if still_armed {
                let _ = tx.send(TimerFired { id, key });
            }
        });
        guard.insert(id, task.abort_handle());
        trace!(timer = %id, delay_ms = delay.as_millis() as u64, "Timer armed");
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match lock_live(&self.live).remove(&id) {
            Some(handle) => {
                handle.abort();
                trace!(timer = %id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    fn armed(&self) -> usize {
        lock_live(&self.live).len()
    }

    fn cancel_all(&self) -> usize {
        let drained: Vec<_> = lock_live(&self.live).drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ChannelId;

    fn key(channel: &str) -> TrackingKey {
        TrackingKey::Channel {
            channel: ChannelId::from(channel),
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (timers, mut rx) = TokioTimers::new();
        let id = timers.schedule_after(Duration::from_secs(60), key("c1"));
        assert_eq!(timers.armed(), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.id, id);
        assert_eq!(fired.key, key("c1"));
        assert_eq!(timers.armed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_from_scheduling() {
        let (timers, mut rx) = TokioTimers::new();
        let first = timers.schedule_after(Duration::from_secs(60), key("c1"));

        // Clock moves before the timer task is ever polled
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = timers.schedule_after(Duration::from_secs(60), key("c2"));
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap().id, first);
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap().id, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_delivers() {
        let (timers, mut rx) = TokioTimers::new();
        let id = timers.schedule_after(Duration::from_secs(60), key("c1"));
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id), "second cancel is a no-op");
        assert_eq!(timers.armed(), 0);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (timers, mut rx) = TokioTimers::new();
        timers.schedule_after(Duration::from_secs(1), key("c1"));
        timers.schedule_after(Duration::from_secs(2), key("c2"));
        assert_eq!(timers.cancel_all(), 2);
        assert_eq!(timers.armed(), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_distinct() {
        let (timers, _rx) = TokioTimers::new();
        let a = timers.schedule_after(Duration::from_secs(1), key("c1"));
        let b = timers.schedule_after(Duration::from_secs(1), key("c1"));
        assert_ne!(a, b);
    }
}
