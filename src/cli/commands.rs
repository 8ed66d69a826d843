//! CLI command implementations

use std::time::Duration;

use tracing::{error, info};

use crate::application;
use crate::config::Config;
use crate::error::Result;
use crate::producer::ProducerAdapter;
use crate::scheduler::SchedulerCore;
use crate::transport::TransportAdapter;
use crate::wiring::spawn_scheduler;

/// Start the bridge: scheduler, transport, and application layer wired
/// together, running until the process is killed (the transport's
/// reconnect loop never returns on its own).
pub async fn start(config: &Config) -> Result<()> {
    info!(host_url = %config.host_url, max_in_flight = config.max_in_flight, "starting bridge client");

    let scheduler_core =
        SchedulerCore::new(config.max_in_flight).with_no_drop_cap(config.no_drop_queue_cap);
    let (scheduler_handle, scheduled_rx) = spawn_scheduler(scheduler_core);

    let producer = ProducerAdapter::new(config, scheduler_handle.clone());
    let (transport, events_rx) = TransportAdapter::new(config, scheduler_handle);

    let app_task = tokio::spawn(application::run(
        events_rx,
        producer,
        config.subscribe_topic_regex.clone(),
        config.verbosity,
    ));

    transport.run(scheduled_rx).await;

    app_task.abort();
    Ok(())
}

/// Print the effective configuration (after defaults + file + env
/// overrides have been merged). There are no secrets in this crate's
/// configuration to mask, but the command is kept for parity with the
/// rest of the fleet tooling.
pub fn show_config(config: &Config) -> Result<()> {
    println!("{config:#?}");
    Ok(())
}

/// One-shot connectivity probe: attempt a WebSocket handshake against
/// `host_url` and report success or failure without running the
/// scheduler or entering the reconnect loop.
pub async fn health(config: &Config) -> Result<()> {
    info!(host_url = %config.host_url, "probing bridge connectivity");

    let url = url::Url::parse(&config.host_url)
        .map_err(|e| crate::error::Error::Config(format!("invalid host_url: {e}")))?;

    let attempt = tokio::time::timeout(
        Duration::from_secs(5),
        tokio_tungstenite::connect_async(url),
    )
    .await;

    match attempt {
        Ok(Ok(_)) => {
            println!("OK: connected to {}", config.host_url);
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "handshake failed");
            println!("FAIL: {e}");
            Err(e.into())
        }
        Err(_) => {
            error!("handshake timed out");
            println!("FAIL: timed out after 5s");
            Err(crate::error::Error::TransportConnection(
                "timed out".to_string(),
            ))
        }
    }
}
