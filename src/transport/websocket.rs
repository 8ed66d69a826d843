//! Transport Adapter — owns the remote WebSocket connection, reports
//! backpressure and the "connected" edge, and consumes messages released
//! by the scheduler.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ReconnectConfig};
use crate::error::Result;
use crate::scheduler::Scheduled;
use crate::wiring::SchedulerHandle;

/// Control frame the broker sends to report cumulative delivery progress.
/// Multiplexed on the same socket as envelope frames, distinguished by
/// WebSocket message type (`Text` for control, `Binary` for envelopes).
#[derive(Debug, Serialize, Deserialize)]
struct AckFrame {
    ack: u64,
}

/// Edges the application layer reacts to.
pub enum TransportEvent {
    Connected,
    MessageReceived(Vec<u8>),
}

/// Owns one remote connection. `send` semantics live inside the
/// `connect_and_stream` loop: every scheduled release increments
/// `next_index` locally and republishes `(next_index, last_acked_index)`
/// to the scheduler so it can recompute outstanding credit.
pub struct TransportAdapter {
    host_url: String,
    reconnect: ReconnectConfig,
    scheduler: SchedulerHandle,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportAdapter {
    pub fn new(
        config: &Config,
        scheduler: SchedulerHandle,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                host_url: config.host_url.clone(),
                reconnect: config.reconnect.clone(),
                scheduler,
                events_tx,
            },
            events_rx,
        )
    }

    /// Runs until a non-retryable error is hit: connect, stream, reconnect
    /// with exponential backoff on transient failures. No-drop messages
    /// enqueued while disconnected simply accumulate in the scheduler's
    /// no-drop FIFO and are released on the next successful connection.
    pub async fn run(self, mut scheduled_rx: mpsc::UnboundedReceiver<Scheduled>) {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.reconnect.initial_backoff_ms),
            max_interval: Duration::from_secs(self.reconnect.max_backoff_secs),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        loop {
            match self.connect_and_stream(&mut scheduled_rx).await {
                Ok(()) => {
                    info!("transport closed cleanly");
                    backoff.reset();
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "transport error, reconnecting");
                }
                Err(e) => {
                    error!(error = %e, "non-retryable transport error, giving up");
                    return;
                }
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| Duration::from_secs(self.reconnect.max_backoff_secs));
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_and_stream(
        &self,
        scheduled_rx: &mut mpsc::UnboundedReceiver<Scheduled>,
    ) -> Result<()> {
        info!(url = %self.host_url, "connecting to bridge");
        let url = url::Url::parse(&self.host_url)
            .map_err(|e| crate::error::Error::Config(format!("invalid host_url: {e}")))?;
        let (ws_stream, _) = connect_async(url).await?;
        info!("connected to bridge");

        let _ = self.events_tx.send(TransportEvent::Connected);

        let (mut write, mut read) = ws_stream.split();
        let mut next_index: u64 = 0;
        let mut last_acked_index: u64 = 0;

        loop {
            tokio::select! {
                scheduled = scheduled_rx.recv() => {
                    let Some(scheduled) = scheduled else {
                        return Ok(());
                    };
                    write.send(Message::Binary(scheduled.data)).await?;
                    next_index += 1;
                    self.scheduler.backpressure_update(next_index, last_acked_index);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<AckFrame>(&text) {
                                Ok(ack) if ack.ack >= last_acked_index => {
                                    last_acked_index = ack.ack;
                                    self.scheduler.backpressure_update(next_index, last_acked_index);
                                }
                                Ok(_) => debug!("ignoring stale ack"),
                                Err(e) => warn!(error = %e, "malformed control frame"),
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let _ = self.events_tx.send(TransportEvent::MessageReceived(data));
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(());
                        }
                        Some(Err(e)) => return Err(e.into()),
                        _ => {}
                    }
                }
            }
        }
    }
}
