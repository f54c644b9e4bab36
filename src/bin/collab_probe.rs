//! Connection probe
//!
//! Connects to a collaboration server using `config/collab_config.yaml`
//! (or `COLLAB_CONFIG_PATH`), optionally joins `COLLAB_SESSION`, logs every
//! status change and inbound message, and prints connection metrics until
//! Ctrl+C.

use anyhow::{Context, Result};
use realtime_collab::bin_common::{
    cli::{SESSION_ENV_VAR, TOKEN_ENV_VAR},
    init_tracing, load_config_from_env, optional_env, BinaryRunner, ConfigType, RunConfig,
    ShutdownManager,
};
use realtime_collab::livesockets::{
    self, ConnectionManager, ConnectionOptions, InboundMessage,
};
use std::time::Duration;
use tracing::{info, warn};

struct CollabProbe {
    config: RunConfig,
    manager: ConnectionManager,
    session: Option<String>,
    shutdown: ShutdownManager,
}

impl CollabProbe {
    fn new(options: ConnectionOptions, session: Option<String>) -> Result<Self> {
        let manager = livesockets::builder()
            .options(options)
            .on_status_change(|event| match (event.attempt, event.code) {
                (Some(attempt), _) => info!("Status: {} (attempt {})", event.status, attempt),
                (None, Some(code)) => info!(
                    "Status: {} ({} {})",
                    event.status,
                    code,
                    event.reason.as_deref().unwrap_or("")
                ),
                (None, None) => info!("Status: {}", event.status),
            })
            .on_error(|e| warn!("Connection error: {}", e))
            .on_message(|message: &InboundMessage| match message {
                InboundMessage::Other { kind, body } => info!("<- {}: {}", kind, body),
                other => info!("<- {}", other.kind()),
            })
            .build()
            .context("Failed to build connection manager")?;

        let shutdown = ShutdownManager::new();
        shutdown.spawn_signal_handler();

        Ok(Self {
            config: RunConfig::new("Collab Probe").with_status_interval(30),
            manager,
            session,
            shutdown,
        })
    }
}

impl BinaryRunner for CollabProbe {
    async fn run(&mut self) -> Result<()> {
        info!("Connecting to {}", self.manager.url());
        self.manager.connect();

        if let Some(session) = &self.session {
            self.manager.join_session(session.as_str(), Some("collab-probe"));
        }

        let interval = Duration::from_secs(self.config.status_interval_secs);
        while self.shutdown.is_running() {
            self.shutdown.interruptible_sleep(interval).await;

            let metrics = self.manager.connection_metrics();
            info!(
                "Heartbeat: status={} uptime={:?} sent={} received={} queued={} rtt={:?} avg_rtt={:?}",
                metrics.status,
                metrics.uptime,
                metrics.messages_sent,
                metrics.messages_received,
                metrics.queued_messages,
                metrics.last_round_trip,
                metrics.smoothed_round_trip
            );
        }

        self.manager.disconnect(None, None);
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.config
    }

    fn stats(&self) -> Option<String> {
        let metrics = self.manager.connection_metrics();
        Some(format!(
            "Frames sent: {}, received: {}",
            metrics.messages_sent, metrics.messages_received
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("info");

    let config_path = load_config_from_env(ConfigType::Collab);
    let mut options = ConnectionOptions::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(token) = optional_env(TOKEN_ENV_VAR) {
        options.token = Some(token);
    }

    let mut probe = CollabProbe::new(options, optional_env(SESSION_ENV_VAR))?;
    probe.execute().await
}
