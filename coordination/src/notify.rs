//! Notification Sink contract and notice wording
//!
//! The sink is an external collaborator (DM gateway, webhook relay). The
//! engine hands it a fully rendered string and treats every failure as
//! best-effort: logged, never retried mid-stage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DeliveryError;
use crate::events::MessageLink;
use crate::ids::UserId;

/// Delivers a direct message to one target
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, target: &UserId, text: &str) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    async fn send(&self, target: &UserId, text: &str) -> Result<(), DeliveryError> {
        (**self).send(target, text).await
    }
}

/// Which wording a stage notification uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Stage 0, sent to the owner
    FirstAlert,
    /// A later stage whose recipient is the owner
    Reminder,
    /// A later stage to someone other than the owner
    Escalation,
}

/// One rendered stage notification
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    pub kind: NoticeKind,
    pub owner: &'a UserId,
    pub author: &'a UserId,
    pub link: &'a MessageLink,
}

impl<'a> Notice<'a> {
    pub fn for_stage(
        stage: usize,
        recipient: &UserId,
        owner: &'a UserId,
        author: &'a UserId,
        link: &'a MessageLink,
    ) -> Self {
        let kind = if stage == 0 {
            NoticeKind::FirstAlert
        } else if recipient == owner {
            NoticeKind::Reminder
        } else {
            NoticeKind::Escalation
        };
        Self {
            kind,
            owner,
            author,
            link,
        }
    }

    pub fn render(&self) -> String {
        match self.kind {
            NoticeKind::FirstAlert => format!(
                "Hey {}, you haven't replied to {}'s message yet!\nLink: {}",
                self.owner.mention(),
                self.author.mention(),
                self.link
            ),
            NoticeKind::Reminder => format!(
                "Reminder: you still haven't replied to {}'s message.\nLink: {}",
                self.author.mention(),
                self.link
            ),
            NoticeKind::Escalation => format!(
                "{} has not replied to {}'s message.\nLink: {}",
                self.owner.mention(),
                self.author.mention(),
                self.link
            ),
        }
    }
}
