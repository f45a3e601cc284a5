//! Reply Observer — recognises responders and clears their channels
//!
//! Any reply or reaction by the owner or a tier member in a watched channel
//! cancels every chain under that channel. Cancellation is channel-scoped,
//! not author-scoped: a human reply in the channel counts as attending to
//! every waiting customer there.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use crate::escalation::state::{ChainStatus, TrackingKey};
use crate::escalation::tracker::{RemoveOutcome, TrackerStore};
use crate::events::{InboundMessage, InboundReaction};
use crate::ids::{ChainId, ChannelId, UserId};
use crate::policy::{Owner, SharedPolicy};
use crate::stats::ResponseStats;
use crate::timer::TimerService;

/// Why an inbound event had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Bot or webhook account
    Automated,
    /// Channel not claimed by any owner
    UnwatchedChannel,
    /// Reaction by someone who is not a responder for the channel
    NotResponder,
}

/// What an inbound event means for the escalation core
#[derive(Debug, Clone)]
pub enum Classification<'p> {
    Ignored(IgnoreReason),
    /// Customer message that may start a chain
    Qualifying { owner: &'p Owner },
    /// Owner or tier member acting in one of the owner's channels
    Responder { owner: &'p Owner, channel: ChannelId },
}

/// One chain cleared by a responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledChain {
    pub chain_id: ChainId,
    pub key: TrackingKey,
    /// Last stage the chain had reached
    pub stage: usize,
    pub status: ChainStatus,
    /// `now - created_at` of the cancelled chain
    pub response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct ReplyObserver {
    policy: SharedPolicy,
}

impl ReplyObserver {
    pub fn new(policy: SharedPolicy) -> Self {
        Self { policy }
    }

    pub fn classify_message(&self, msg: &InboundMessage) -> Classification<'_> {
        if msg.is_automated {
            return Classification::Ignored(IgnoreReason::Automated);
        }
        let Some(owner) = self.policy.owner_for_channel(&msg.channel_id) else {
            return Classification::Ignored(IgnoreReason::UnwatchedChannel);
        };
        if owner.is_responder(&msg.author_id) {
            Classification::Responder {
                owner,
                channel: msg.channel_id.clone(),
            }
        } else {
            Classification::Qualifying { owner }
        }
    }

    /// Reactions only ever cancel; a customer reaction is ignored
    pub fn classify_reaction(&self, reaction: &InboundReaction) -> Classification<'_> {
        if reaction.is_automated {
            return Classification::Ignored(IgnoreReason::Automated);
        }
        let Some(owner) = self.policy.owner_for_channel(&reaction.channel_id) else {
            return Classification::Ignored(IgnoreReason::UnwatchedChannel);
        };
        if owner.is_responder(&reaction.actor_id) {
            Classification::Responder {
                owner,
                channel: reaction.channel_id.clone(),
            }
        } else {
            Classification::Ignored(IgnoreReason::NotResponder)
        }
    }

    /// Cancel every chain the owner has in `channel`.
    ///
    /// Timer cancellation and store removal happen together per chain, so no
    /// chain is left registered without a cancellable timer or vice versa.
    pub fn cancel_channel<T: TimerService + ?Sized>(
        store: &mut TrackerStore,
        timers: &T,
        stats: Option<&ResponseStats>,
        owner_id: &UserId,
        channel: &ChannelId,
        responder: &UserId,
        now: DateTime<Utc>,
    ) -> Vec<CancelledChain> {
        let mut cancelled = Vec::new();
        for key in store.keys_for_owner_channel(owner_id, channel) {
            let RemoveOutcome::Removed(mut chain) = store.remove_if_present(&key) else {
                continue;
            };
            if let Some(timer) = chain.take_timer() {
                timers.cancel(timer);
            }
            chain.status = ChainStatus::Cancelled;
            let response_time = chain.elapsed(now);
            if let Some(stats) = stats {
                let sample = stats.record(owner_id, response_time);
                info!(
                    chain = %chain.id,
                    owner = %owner_id,
                    response_ms = response_time.as_millis() as u64,
                    samples = sample.count,
                    "Response time recorded"
                );
            }
            info!(
                chain = %chain.id,
                key = %key,
                owner = %owner_id,
                responder = %responder,
                stage = chain.stage,
                "Chain cancelled by responder"
            );
            cancelled.push(CancelledChain {
                chain_id: chain.id,
                key,
                stage: chain.stage,
                status: chain.status,
                response_time,
            });
        }
        cancelled
    }
}
