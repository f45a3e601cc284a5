//! Escalation Service — single-task event loop around the engine
//!
//! ```text
//!  ServiceHandle ──Command──┐
//!                           ▼
//!                    ┌──────────────┐        ┌─────────────┐
//!                    │ select! loop │◀───────│ TokioTimers │
//!                    │   (engine)   │ fired  └─────────────┘
//!                    └──────────────┘
//! ```
//!
//! Inbound events and timer fires are dispatched one at a time, so the
//! tracker store is never touched concurrently and needs no lock.
//! Commands win ties against timer fires: a responder event already queued
//! is processed before a stage that came due at the same moment.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::escalation::{Chain, EscalationEngine, MessageOutcome, ReactionOutcome};
use crate::events::WatchEvent;
use crate::ids::UserId;
use crate::notify::NotificationSink;
use crate::stats::ResponseSample;
use crate::timer::{TimerFired, TimerService};

/// Pending commands before `submit` starts waiting
const COMMAND_BUFFER: usize = 256;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Escalation service has stopped")]
    Stopped,
}

/// Result of one submitted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Message(MessageOutcome),
    Reaction(ReactionOutcome),
    /// A `stats` event or an `!avgtime` message
    StatsReport(Vec<(UserId, ResponseSample)>),
}

enum Command {
    Event(WatchEvent, oneshot::Sender<EventOutcome>),
    Stats(oneshot::Sender<Vec<(UserId, ResponseSample)>>),
    ActiveChains(oneshot::Sender<Vec<Chain>>),
    Shutdown(oneshot::Sender<usize>),
}

/// Cloneable front door to a running service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
}

impl ServiceHandle {
    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> ServiceResult<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        reply_rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Feed one inbound event and wait until it has been applied
    pub async fn submit(&self, event: WatchEvent) -> ServiceResult<EventOutcome> {
        self.request(|reply| Command::Event(event, reply)).await
    }

    pub async fn stats(&self) -> ServiceResult<Vec<(UserId, ResponseSample)>> {
        self.request(Command::Stats).await
    }

    pub async fn active_chains(&self) -> ServiceResult<Vec<Chain>> {
        self.request(Command::ActiveChains).await
    }

    /// Cancel every pending timer and stop the loop. Returns how many timers
    /// were still live.
    pub async fn shutdown(&self) -> ServiceResult<usize> {
        self.request(Command::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct EscalationService;

impl EscalationService {
    /// Move the engine onto its own task.
    ///
    /// `timer_rx` must be the receiver paired with the engine's `TokioTimers`.
    /// If every handle is dropped the loop shuts the engine down and exits.
    pub fn spawn<S, T, C>(
        engine: EscalationEngine<S, T, C>,
        timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    ) -> (ServiceHandle, JoinHandle<()>)
    where
        S: NotificationSink + 'static,
        T: TimerService + 'static,
        C: Clock + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(engine, rx, timer_rx));
        (ServiceHandle { tx }, task)
    }
}

async fn run<S, T, C>(
    mut engine: EscalationEngine<S, T, C>,
    mut commands: mpsc::Receiver<Command>,
    mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
) where
    S: NotificationSink,
    T: TimerService,
    C: Clock,
{
    info!(
        owners = engine.policy().owners().len(),
        channels = engine.policy().watched_channel_count(),
        granularity = %engine.config().granularity,
        gated = engine.availability().is_some(),
        "Escalation service started"
    );

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(command) => {
                    if !handle(&mut engine, command) {
                        break;
                    }
                }
                None => {
                    debug!("All service handles dropped");
                    engine.shutdown();
                    break;
                }
            },

            Some(fired) = timer_rx.recv() => {
                let outcome = engine.on_stage_fire(fired).await;
                debug!(outcome = ?outcome, "Timer fire handled");
            }
        }
    }

    info!("Escalation service stopped");
}

/// Apply one command; returns false once the loop should stop
fn handle<S, T, C>(engine: &mut EscalationEngine<S, T, C>, command: Command) -> bool
where
    S: NotificationSink,
    T: TimerService,
    C: Clock,
{
    match command {
        Command::Event(event, reply) => {
            let outcome = match &event {
                WatchEvent::Message(msg) if msg.is_stats_command() => {
                    if let Some(replied) = engine.on_stats_command(msg) {
                        debug!(outcome = ?replied, "Stats request also answered the channel");
                    }
                    EventOutcome::StatsReport(engine.stats_snapshot())
                }
                WatchEvent::Message(msg) => EventOutcome::Message(engine.on_message(msg)),
                WatchEvent::Reaction(reaction) => {
                    EventOutcome::Reaction(engine.on_reaction(reaction))
                }
                WatchEvent::Stats => EventOutcome::StatsReport(engine.stats_snapshot()),
            };
            let _ = reply.send(outcome);
        }
        Command::Stats(reply) => {
            let _ = reply.send(engine.stats_snapshot());
        }
        Command::ActiveChains(reply) => {
            let _ = reply.send(engine.active_chains());
        }
        Command::Shutdown(reply) => {
            let _ = reply.send(engine.shutdown());
            return false;
        }
    }
    true
}
