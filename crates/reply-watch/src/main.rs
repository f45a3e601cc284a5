use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reply_coordination::{
    AlertLatch, EscalationEngine, EscalationService, EventOutcome, NotificationSink, SystemClock,
    TokioTimers, WatchConfig,
};
use reply_watch::config::{RuntimeConfig, SinkKind};
use reply_watch::sink::{LogSink, WebhookSink};
use reply_watch::{feed, report};
use tokio::io::BufReader;
use tracing::{info, warn};

/// Escalate customer messages nobody has answered
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Escalation policy file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where notifications go
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// Relay URL for the webhook sink
    #[arg(long)]
    webhook_url: Option<String>,

    /// Persist relay-health alert state here
    #[arg(long)]
    alert_state: Option<PathBuf>,

    /// Print the response-time report before exiting
    #[arg(long)]
    stats_on_exit: bool,
}

impl Args {
    fn into_runtime(self) -> (RuntimeConfig, bool) {
        let mut runtime = RuntimeConfig::default();
        if let Some(path) = self.config {
            runtime.config_path = path;
        }
        if let Some(sink) = self.sink {
            runtime.sink = sink;
        }
        if self.webhook_url.is_some() {
            runtime.webhook_url = self.webhook_url;
        }
        runtime.alert_state = self.alert_state;
        (runtime, self.stats_on_exit)
    }
}

fn build_sink(runtime: &RuntimeConfig) -> Result<Arc<dyn NotificationSink>> {
    match runtime.sink {
        SinkKind::Log => Ok(Arc::new(LogSink)),
        SinkKind::Webhook => {
            let url = runtime
                .webhook_url
                .as_deref()
                .context("Webhook sink selected without a URL")?;
            let mut sink = WebhookSink::new(url)?;
            if let Some(path) = &runtime.alert_state {
                sink = sink.with_alert_latch(AlertLatch::load(path));
            }
            Ok(Arc::new(sink))
        }
    }
}

fn print_outcome(outcome: &EventOutcome) {
    if let EventOutcome::StatsReport(samples) = outcome {
        println!("{}", report::render(samples));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (runtime, stats_on_exit) = Args::parse().into_runtime();
    runtime.validate()?;

    let mut config = WatchConfig::load(&runtime.config_path).with_context(|| {
        format!(
            "Failed to load escalation policy from {}",
            runtime.config_path.display()
        )
    })?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    info!(
        config = %runtime.config_path.display(),
        sink = ?runtime.sink,
        granularity = %config.engine.granularity,
        off_hours = ?config.engine.off_hours,
        gated = config.availability.is_some(),
        "reply-watch starting"
    );

    let sink = build_sink(&runtime)?;
    let (timers, timer_rx) = TokioTimers::new();
    let mut engine = EscalationEngine::new(
        config.policy.shared(),
        config.engine,
        sink,
        timers,
        SystemClock,
    );
    if let Some(window) = config.availability {
        engine = engine.with_availability(window);
    }

    let (handle, task) = EscalationService::spawn(engine, timer_rx);
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        summary = feed::pump(stdin, &handle, print_outcome) => {
            let summary = summary?;
            info!(
                lines = summary.lines,
                events = summary.events,
                skipped = summary.skipped,
                "Event feed closed"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Interrupted");
        }
    }

    if stats_on_exit {
        match handle.stats().await {
            Ok(samples) => println!("{}", report::render(&samples)),
            Err(e) => warn!(error = %e, "Could not read response stats"),
        }
    }

    match handle.shutdown().await {
        Ok(cancelled) => info!(cancelled, "Pending escalations cancelled"),
        Err(e) => warn!(error = %e, "Escalation service already stopped"),
    }
    drop(handle);
    task.await.context("Escalation service task panicked")?;

    Ok(())
}
