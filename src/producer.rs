//! Producer Adapter — accepts application-produced messages and forwards
//! them into the scheduler with per-topic policy attributes. Performs no
//! queuing of its own; the scheduler is the sole authority on rate limits.

use tracing::debug;

use crate::config::{Config, TopicPolicy};
use crate::error::Result;
use crate::transport::envelope::{encode_envelope, EnvelopeMetadata};
use crate::wiring::SchedulerHandle;

/// Something that can be encoded to the wire envelope. The scheduler
/// never sees the inner type, only the bytes this trait produces.
pub trait Encodable {
    /// Message type tag carried in the envelope metadata.
    fn msg_type() -> &'static str;

    /// Encode just the payload body (no metadata, no framing).
    fn encode_payload(&self) -> Result<Vec<u8>>;
}

/// Forwards encoded application messages into the scheduler, looking up
/// each topic's release policy from configuration.
pub struct ProducerAdapter {
    policies: std::collections::HashMap<String, TopicPolicy>,
    scheduler: SchedulerHandle,
}

impl ProducerAdapter {
    pub fn new(config: &Config, scheduler: SchedulerHandle) -> Self {
        Self {
            policies: config.topics.clone(),
            scheduler,
        }
    }

    fn policy_for(&self, topic: &str) -> TopicPolicy {
        self.policies.get(topic).cloned().unwrap_or_default()
    }

    /// Encode `msg` for `topic` and enqueue it under that topic's
    /// configured policy.
    pub fn send<T: Encodable>(&self, topic: &str, msg: &T) -> Result<()> {
        let policy = self.policy_for(topic);
        let metadata = EnvelopeMetadata {
            msg_type: T::msg_type().to_string(),
            topic: topic.to_string(),
        };
        let payload = msg.encode_payload()?;
        let frame = encode_envelope(&metadata, &payload)?;

        debug!(topic, msg_type = T::msg_type(), bytes = frame.len(), "encoded message");

        self.scheduler.enqueue(
            topic.to_string(),
            frame,
            policy.priority,
            std::time::Duration::from_secs_f64(policy.rate_limit_sec),
            policy.no_drop,
        );
        Ok(())
    }

    /// Enqueue `msg` as no-drop regardless of its configured policy,
    /// overriding only the `no_drop` flag (used for onboarding messages
    /// whose delivery is mandatory even on a topic nobody configured).
    pub fn send_no_drop<T: Encodable>(&self, topic: &str, msg: &T, priority: f64) -> Result<()> {
        let metadata = EnvelopeMetadata {
            msg_type: T::msg_type().to_string(),
            topic: topic.to_string(),
        };
        let payload = msg.encode_payload()?;
        let frame = encode_envelope(&metadata, &payload)?;

        self.scheduler.enqueue(
            topic.to_string(),
            frame,
            priority,
            std::time::Duration::ZERO,
            true,
        );
        Ok(())
    }
}
