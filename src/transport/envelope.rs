//! The wire envelope: a length-delimited binary record carrying topic/type
//! metadata plus an opaque payload body. The scheduler never looks inside
//! this — it only ever handles the finished `Vec<u8>` blob.
//!
//! Framing: `[u32 LE metadata_len][bincode(EnvelopeMetadata)][payload]`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metadata header wrapping every outbound/inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub msg_type: String,
    pub topic: String,
}

/// A decoded envelope: metadata plus the still-opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEnvelope {
    pub metadata: EnvelopeMetadata,
    pub payload: Vec<u8>,
}

/// Encode a metadata header plus payload into one length-delimited frame.
pub fn encode_envelope(metadata: &EnvelopeMetadata, payload: &[u8]) -> Result<Vec<u8>> {
    let metadata_bytes = bincode::serialize(metadata)?;
    let metadata_len: u32 = metadata_bytes
        .len()
        .try_into()
        .map_err(|_| Error::EnvelopeEncode("metadata too large to frame".to_string()))?;

    let mut frame = Vec::with_capacity(4 + metadata_bytes.len() + payload.len());
    frame.extend_from_slice(&metadata_len.to_le_bytes());
    frame.extend_from_slice(&metadata_bytes);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode a frame produced by [`encode_envelope`].
pub fn decode_envelope(frame: &[u8]) -> Result<WireEnvelope> {
    if frame.len() < 4 {
        return Err(Error::EnvelopeDecode("frame shorter than length prefix".to_string()));
    }
    let metadata_len = u32::from_le_bytes(frame[0..4].try_into().unwrap()) as usize;
    let metadata_end = 4usize
        .checked_add(metadata_len)
        .ok_or_else(|| Error::EnvelopeDecode("metadata length overflow".to_string()))?;
    if frame.len() < metadata_end {
        return Err(Error::EnvelopeDecode("frame shorter than declared metadata length".to_string()));
    }

    let metadata: EnvelopeMetadata = bincode::deserialize(&frame[4..metadata_end])
        .map_err(|e| Error::EnvelopeDecode(e.to_string()))?;
    let payload = frame[metadata_end..].to_vec();

    Ok(WireEnvelope { metadata, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_metadata_and_payload() {
        let metadata = EnvelopeMetadata {
            msg_type: "RobofleetSubscription".to_string(),
            topic: "subscriptions".to_string(),
        };
        let payload = b"hello world".to_vec();

        let frame = encode_envelope(&metadata, &payload).unwrap();
        let decoded = decode_envelope(&frame).unwrap();

        assert_eq!(decoded.metadata, metadata);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn rejects_truncated_frame() {
        let err = decode_envelope(&[0, 0]).unwrap_err();
        assert!(matches!(err, Error::EnvelopeDecode(_)));
    }
}
