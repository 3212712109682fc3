//! The inter-core wire format: every message exchanged between two Liun
//! cores is the tuple `(sender_id, recipient_id, channel_run_idx,
//! message_type, payload, mac_tag)`.
//!
//! This module only owns the envelope shape and the field-element codec;
//! MAC computation/verification belongs to the [`crate::channel::KeyChannel`]
//! the envelope travels over, and framing/transport is out of scope here.

use liun_field::FieldElement;
use serde::{Deserialize, Serialize};

/// `message_type`: one tag per protocol message kind this core emits or
/// consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    DkgShare,
    DkgCross,
    DkgComplaint,
    IntroRequest,
    IntroComponent,
    IntroAck,
    SigPartial,
    SigCombined,
    VerifyAttestation,
    Dispute,
    GossipEdge,
}

/// One message on the wire between two cores. `payload` carries
/// type-specific, already-encoded bytes (field elements 8-byte
/// little-endian, byte strings length-prefixed); this type doesn't
/// interpret `payload`, only carries it alongside the routing and
/// authentication metadata every message needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: FieldElement,
    pub recipient: FieldElement,
    pub channel_run_idx: u64,
    pub message_type: MessageType,
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    pub mac_tag: FieldElement,
}

impl Envelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sender: FieldElement,
        recipient: FieldElement,
        channel_run_idx: u64,
        message_type: MessageType,
        payload: Vec<u8>,
        mac_tag: FieldElement,
    ) -> Self {
        Envelope {
            sender,
            recipient,
            channel_run_idx,
            message_type,
            payload,
            mac_tag,
        }
    }

    /// Recipients must reject any message whose run_idx is less than the
    /// last-accepted run_idx on that channel. MAC verification itself is the
    /// caller's job (it needs the channel); this only judges staleness.
    pub fn is_stale(&self, last_accepted_run_idx: u64) -> bool {
        self.channel_run_idx < last_accepted_run_idx
    }
}

/// Encodes field elements as 8-byte little-endian, concatenated — the
/// payload encoding for field-element-valued payloads.
pub fn encode_field_elements(values: &[FieldElement]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.value().to_le_bytes());
    }
    out
}

/// Inverse of [`encode_field_elements`]. Silently ignores a trailing partial
/// chunk: callers that care about exact length should check
/// `bytes.len() % 8 == 0` themselves.
pub fn decode_field_elements(bytes: &[u8]) -> Vec<FieldElement> {
    bytes
        .chunks_exact(8)
        .map(|c| FieldElement::new(u64::from_le_bytes(c.try_into().unwrap())))
        .collect()
}

/// Length-prefixes `bytes` with a 4-byte little-endian length.
pub fn encode_length_prefixed(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Reads one length-prefixed byte string from the front of `input`,
/// returning it and the remaining, unconsumed bytes.
pub fn decode_length_prefixed(input: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    if input.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes(input[..4].try_into().unwrap()) as usize;
    let rest = &input[4..];
    if rest.len() < len {
        return None;
    }
    Some((rest[..len].to_vec(), &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_elements_round_trip() {
        let values = vec![FieldElement::new(1), FieldElement::new(u64::MAX), FieldElement::new(0)];
        let bytes = encode_field_elements(&values);
        assert_eq!(bytes.len(), 24);
        assert_eq!(decode_field_elements(&bytes), values);
    }

    #[test]
    fn length_prefixed_round_trips_and_leaves_remainder() {
        let a = encode_length_prefixed(b"hello");
        let b = encode_length_prefixed(b"world");
        let mut combined = a;
        combined.extend_from_slice(&b);

        let (first, rest) = decode_length_prefixed(&combined).unwrap();
        assert_eq!(first, b"hello");
        let (second, rest) = decode_length_prefixed(rest).unwrap();
        assert_eq!(second, b"world");
        assert!(rest.is_empty());
    }

    #[test]
    fn stale_run_idx_is_flagged() {
        let envelope = Envelope::new(
            FieldElement::new(1),
            FieldElement::new(2),
            3,
            MessageType::SigPartial,
            vec![],
            FieldElement::ZERO,
        );
        assert!(envelope.is_stale(4));
        assert!(!envelope.is_stale(3));
    }

}
