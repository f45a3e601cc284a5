//! Escalation Engine — drives each chain through its stage ladder
//!
//! All mutation happens through `&mut self`; the service loop feeds inbound
//! events and timer fires in one at a time. A chain owns at most one pending
//! timer: every transition consumes the old timer before arming a new one.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::availability::{AvailabilityWindow, OffHoursPolicy};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::escalation::observer::{CancelledChain, Classification, IgnoreReason, ReplyObserver};
use crate::escalation::state::{Chain, ChainStatus, TrackingKey};
use crate::escalation::tracker::{RemoveOutcome, TrackerStore};
use crate::events::{InboundMessage, InboundReaction};
use crate::ids::{ChainId, ChannelId, UserId};
use crate::notify::{Notice, NotificationSink};
use crate::policy::{EscalationPolicy, Owner, SharedPolicy};
use crate::stats::{ResponseSample, ResponseStats, SharedResponseStats};
use crate::timer::{TimerFired, TimerService};

/// Effect of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// New chain created with its stage 0 timer armed
    ChainStarted { chain: ChainId, key: TrackingKey },
    /// A live chain already holds this key (coarse mode, or a redelivered message)
    AlreadyTracked { key: TrackingKey },
    /// A responder spoke; every chain in the channel was cancelled
    ResponderReplied {
        owner: UserId,
        cancelled: Vec<CancelledChain>,
    },
    Ignored(IgnoreReason),
}

/// Effect of an inbound reaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    ResponderReacted {
        owner: UserId,
        cancelled: Vec<CancelledChain>,
    },
    Ignored(IgnoreReason),
}

/// Effect of a timer fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage delivered (best-effort) and the next stage armed
    Notified {
        stage: usize,
        failed: usize,
        next_delay: Duration,
    },
    /// Final tier delivered; chain removed
    Completed { stage: usize, failed: usize },
    /// Fired outside the availability window. `deferred_until` is set when the
    /// same stage was re-armed for the next opening; otherwise the chain parked.
    SkippedOffHours {
        stage: usize,
        deferred_until: Option<DateTime<Utc>>,
    },
    /// Chain gone or timer superseded; nothing done
    Stale,
}

/// The escalation state machine
pub struct EscalationEngine<S, T, C> {
    policy: SharedPolicy,
    observer: ReplyObserver,
    config: EngineConfig,
    gate: Option<AvailabilityWindow>,
    store: TrackerStore,
    stats: SharedResponseStats,
    sink: S,
    timers: T,
    clock: C,
}

impl<S, T, C> EscalationEngine<S, T, C>
where
    S: NotificationSink,
    T: TimerService,
    C: Clock,
{
    pub fn new(policy: SharedPolicy, config: EngineConfig, sink: S, timers: T, clock: C) -> Self {
        Self {
            observer: ReplyObserver::new(Arc::clone(&policy)),
            policy,
            config,
            gate: None,
            store: TrackerStore::new(),
            stats: ResponseStats::new().shared(),
            sink,
            timers,
            clock,
        }
    }

    /// Gate stage delivery on a time-of-day window
    pub fn with_availability(mut self, window: AvailabilityWindow) -> Self {
        self.gate = Some(window);
        self
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn availability(&self) -> Option<&AvailabilityWindow> {
        self.gate.as_ref()
    }

    pub fn store(&self) -> &TrackerStore {
        &self.store
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    /// Per-owner response-time aggregates, ordered by owner id
    pub fn stats_snapshot(&self) -> Vec<(UserId, ResponseSample)> {
        self.stats.snapshot_all()
    }

    /// Copies of every live chain, oldest first
    pub fn active_chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.store.iter().cloned().collect();
        chains.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        chains
    }

    /// Route an inbound message: ignore, cancel, or start a chain
    pub fn on_message(&mut self, msg: &InboundMessage) -> MessageOutcome {
        let observer = self.observer.clone();
        match observer.classify_message(msg) {
            Classification::Ignored(reason) => {
                debug!(
                    author = %msg.author_id,
                    channel = %msg.channel_id,
                    reason = ?reason,
                    "Message ignored"
                );
                MessageOutcome::Ignored(reason)
            }
            Classification::Responder { owner, channel } => {
                let cancelled = self.cancel_for_responder(&owner.id, &channel, &msg.author_id);
                MessageOutcome::ResponderReplied {
                    owner: owner.id.clone(),
                    cancelled,
                }
            }
            Classification::Qualifying { owner } => self.on_qualifying_message(owner, msg),
        }
    }

    /// A report request still counts as a reply when a responder posts it in
    /// a watched channel. It never starts a chain.
    pub fn on_stats_command(&mut self, msg: &InboundMessage) -> Option<MessageOutcome> {
        let observer = self.observer.clone();
        match observer.classify_message(msg) {
            Classification::Responder { owner, channel } => {
                let cancelled = self.cancel_for_responder(&owner.id, &channel, &msg.author_id);
                Some(MessageOutcome::ResponderReplied {
                    owner: owner.id.clone(),
                    cancelled,
                })
            }
            Classification::Ignored(_) | Classification::Qualifying { .. } => None,
        }
    }

    /// Start a chain for a customer message unless its key is already live.
    ///
    /// The author must not be a responder for `owner`; [`on_message`](Self::on_message)
    /// guarantees that.
    pub fn on_qualifying_message(&mut self, owner: &Owner, msg: &InboundMessage) -> MessageOutcome {
        let key = TrackingKey::new(self.config.granularity, &msg.channel_id, &msg.message_id);
        if self.store.contains(&key) {
            debug!(key = %key, author = %msg.author_id, "Chain already tracked for key");
            return MessageOutcome::AlreadyTracked { key };
        }

        // Validated policies always carry a stage 0 delay
        let delay = owner.delay_for_stage(0).unwrap_or_default();
        let mut chain = Chain::new(
            key.clone(),
            owner.id.clone(),
            msg.author_id.clone(),
            msg.link(&self.config.link_host),
            self.clock.now(),
        );
        chain.arm(self.timers.schedule_after(delay, key.clone()));
        let id = chain.id;

        info!(
            chain = %id,
            key = %key,
            owner = %owner.id,
            author = %msg.author_id,
            delay_ms = delay.as_millis() as u64,
            "Chain started"
        );
        self.store.put(chain);
        MessageOutcome::ChainStarted { chain: id, key }
    }

    /// Responder reactions cancel exactly like responder messages
    pub fn on_reaction(&mut self, reaction: &InboundReaction) -> ReactionOutcome {
        let observer = self.observer.clone();
        match observer.classify_reaction(reaction) {
            Classification::Responder { owner, channel } => {
                let cancelled = self.cancel_for_responder(&owner.id, &channel, &reaction.actor_id);
                ReactionOutcome::ResponderReacted {
                    owner: owner.id.clone(),
                    cancelled,
                }
            }
            Classification::Ignored(reason) => {
                debug!(
                    actor = %reaction.actor_id,
                    channel = %reaction.channel_id,
                    reason = ?reason,
                    "Reaction ignored"
                );
                ReactionOutcome::Ignored(reason)
            }
            Classification::Qualifying { .. } => {
                ReactionOutcome::Ignored(IgnoreReason::NotResponder)
            }
        }
    }

    fn cancel_for_responder(
        &mut self,
        owner: &UserId,
        channel: &ChannelId,
        responder: &UserId,
    ) -> Vec<CancelledChain> {
        let stats = self
            .config
            .track_response_times
            .then_some(self.stats.as_ref());
        let now = self.clock.now();
        ReplyObserver::cancel_channel(
            &mut self.store,
            &self.timers,
            stats,
            owner,
            channel,
            responder,
            now,
        )
    }

    /// Run one stage for the chain a timer belongs to.
    ///
    /// Fires for a missing chain, or whose id is not the chain's current
    /// pending timer, are stale and change nothing.
    pub async fn on_stage_fire(&mut self, fired: TimerFired) -> StageOutcome {
        let Some(chain) = self.store.get_mut(&fired.key) else {
            debug!(timer = %fired.id, key = %fired.key, "Stale timer fire (no chain)");
            return StageOutcome::Stale;
        };
        if chain.pending_timer != Some(fired.id) {
            debug!(
                timer = %fired.id,
                key = %fired.key,
                chain = %chain.id,
                "Stale timer fire (superseded)"
            );
            return StageOutcome::Stale;
        }
        chain.take_timer();

        let policy = Arc::clone(&self.policy);
        let Some(owner) = policy.owner(&chain.owner_id) else {
            warn!(chain = %chain.id, owner = %chain.owner_id, "Owner missing from policy; dropping chain");
            self.store.remove_if_present(&fired.key);
            return StageOutcome::Stale;
        };

        let stage = chain.stage;
        let now = self.clock.now();
        if let Some(window) = self.gate {
            if !window.is_within_allowed_window(now) {
                return match self.config.off_hours {
                    OffHoursPolicy::Drop => {
                        chain.park();
                        info!(
                            chain = %chain.id,
                            key = %fired.key,
                            owner = %owner.id,
                            stage,
                            "Stage fired off-hours; dropped and chain parked"
                        );
                        StageOutcome::SkippedOffHours {
                            stage,
                            deferred_until: None,
                        }
                    }
                    OffHoursPolicy::Defer => {
                        let opening = window.next_opening(now);
                        let delay = (opening - now).to_std().unwrap_or_default();
                        chain.arm(self.timers.schedule_after(delay, fired.key.clone()));
                        info!(
                            chain = %chain.id,
                            key = %fired.key,
                            owner = %owner.id,
                            stage,
                            until = %opening,
                            "Stage fired off-hours; deferred to next opening"
                        );
                        StageOutcome::SkippedOffHours {
                            stage,
                            deferred_until: Some(opening),
                        }
                    }
                };
            }
        }

        let chain_id = chain.id;
        let author = chain.author_id.clone();
        let link = chain.origin_link.clone();
        let targets = owner
            .targets_for_stage(stage)
            .map(<[UserId]>::to_vec)
            .unwrap_or_default();

        let mut failed = 0;
        for target in &targets {
            let text = Notice::for_stage(stage, target, &owner.id, &author, &link).render();
            match self.sink.send(target, &text).await {
                Ok(()) => info!(
                    chain = %chain_id,
                    owner = %owner.id,
                    recipient = %target,
                    stage,
                    "Stage notification sent"
                ),
                Err(e) => {
                    failed += 1;
                    warn!(
                        chain = %chain_id,
                        owner = %owner.id,
                        recipient = %target,
                        stage,
                        error = %e,
                        "Stage notification failed; continuing"
                    );
                }
            }
        }

        if owner.is_final_stage(stage) {
            if let RemoveOutcome::Removed(mut chain) = self.store.remove_if_present(&fired.key) {
                chain.status = ChainStatus::Completed;
                info!(chain = %chain.id, key = %chain.key, stage, "Chain completed");
            }
            return StageOutcome::Completed { stage, failed };
        }

        let next_delay = owner.delay_for_stage(stage + 1).unwrap_or_default();
        match self.store.get_mut(&fired.key) {
            Some(chain) if chain.id == chain_id => {
                chain.advance();
                chain.arm(self.timers.schedule_after(next_delay, fired.key.clone()));
                debug!(
                    chain = %chain_id,
                    stage = chain.stage,
                    delay_ms = next_delay.as_millis() as u64,
                    "Next stage armed"
                );
                StageOutcome::Notified {
                    stage,
                    failed,
                    next_delay,
                }
            }
            _ => StageOutcome::Stale,
        }
    }

    /// Cancel every pending timer and empty the store. Returns the number of
    /// timers that were still live.
    pub fn shutdown(&mut self) -> usize {
        let mut chains = self.store.drain_all();
        let mut cancelled = 0;
        for chain in &mut chains {
            if let Some(timer) = chain.take_timer() {
                if self.timers.cancel(timer) {
                    cancelled += 1;
                }
            }
        }
        cancelled += self.timers.cancel_all();
        info!(
            chains = chains.len(),
            timers = cancelled,
            "Escalation engine shut down"
        );
        cancelled
    }
}
