//! Application layer — the onboarding behavior that sits on top of the
//! Producer/Transport adapters. Grounded on `ClientNode.hpp::connected()`
//! in the reference client: on every successful handshake, announce a
//! subscription so the broker knows what this client wants to receive.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::producer::{Encodable, ProducerAdapter};
use crate::transport::TransportEvent;

/// Subscription request sent to the broker once per connection, as a
/// no-drop message so it survives even when the in-flight window is
/// already saturated — it still goes out on the next `schedule()` call
/// regardless of outstanding credit.
#[derive(Debug, Clone, Serialize)]
pub struct RobofleetSubscription {
    pub topic_regex: String,
    /// 1 = subscribe, mirroring the reference client's `action` field.
    pub action: u8,
}

impl RobofleetSubscription {
    pub fn subscribe(topic_regex: impl Into<String>) -> Self {
        Self {
            topic_regex: topic_regex.into(),
            action: 1,
        }
    }
}

impl Encodable for RobofleetSubscription {
    fn msg_type() -> &'static str {
        "RobofleetSubscription"
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Priority the onboarding subscription is enqueued at. High enough to
/// win any best-effort round-robin; moot anyway since it rides the
/// no-drop FIFO, which always bypasses priority selection.
const SUBSCRIPTION_PRIORITY: f64 = 10.0;

/// Drives the two edges the application reacts to: on `connected`,
/// announce the subscription; on `message_received`, log at the
/// configured verbosity. Interpreting received payloads is left to
/// external collaborators downstream of this crate.
pub async fn run(
    mut events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    producer: ProducerAdapter,
    subscribe_topic_regex: String,
    verbosity: u8,
) {
    while let Some(event) = events_rx.recv().await {
        match event {
            TransportEvent::Connected => {
                if verbosity > 1 {
                    info!("websocket connection established");
                }
                let subscription = RobofleetSubscription::subscribe(subscribe_topic_regex.clone());
                if let Err(e) =
                    producer.send_no_drop("subscriptions", &subscription, SUBSCRIPTION_PRIORITY)
                {
                    warn!(error = %e, "failed to enqueue onboarding subscription");
                }
            }
            TransportEvent::MessageReceived(data) => {
                if verbosity > 1 {
                    debug!(bytes = data.len(), "received message");
                }
            }
        }
    }
}
