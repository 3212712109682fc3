use liun_field::FieldElement;
use round_based::ProtocolMessage;
use serde::{Deserialize, Serialize};

/// Message of the DKG protocol, one variant per round. `mac_tag` on each
/// payload is computed over the MAC-relevant bytes (everything but the tag
/// itself) via the sender's channel to the specific recipient.
#[derive(ProtocolMessage, Clone, Serialize, Deserialize)]
pub enum Msg {
    Round1(MsgRound1),
    Round2(MsgRound2),
    Round3(MsgRound3),
}

/// Round 1 ("Distribute"): contributor `i` sends `f_i(j)` to party `j`, along
/// with `f_i(v)` for every verification argument `v` in `j`'s disjoint
/// verification-point block.
#[derive(Clone, Serialize, Deserialize)]
pub struct MsgRound1 {
    /// `f_i(j)`, the evaluation of the sender's contribution polynomial at
    /// the recipient's index.
    pub value: FieldElement,
    /// `f_i(v)` for each `v` in the recipient's verification-point block.
    pub verification_values: Vec<FieldElement>,
    pub mac_tag: FieldElement,
}

impl MsgRound1 {
    pub fn mac_bytes(value: FieldElement, verification_values: &[FieldElement]) -> Vec<u8> {
        let mut bytes = value.value().to_le_bytes().to_vec();
        for v in verification_values {
            bytes.extend_from_slice(&v.value().to_le_bytes());
        }
        bytes
    }
}

/// Round 2 ("Cross-verify"): forwarder `j` relays every `(i, f_i(j))` pair it
/// received in round 1 to recipient `k_peer`.
#[derive(Clone, Serialize, Deserialize)]
pub struct MsgRound2 {
    pub entries: Vec<CrossEntry>,
    pub mac_tag: FieldElement,
}

/// One forwarded `(contributor_party_index, f_contributor(forwarder))` pair.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct CrossEntry {
    pub contributor: u16,
    pub value: FieldElement,
}

impl MsgRound2 {
    pub fn mac_bytes(entries: &[CrossEntry]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(entries.len() * 10);
        for e in entries {
            bytes.extend_from_slice(&e.contributor.to_le_bytes());
            bytes.extend_from_slice(&e.value.value().to_le_bytes());
        }
        bytes
    }
}

/// Round 3 ("Aggregate complaints"): each party broadcasts the set of
/// contributor party-indices it locally suspects.
#[derive(Clone, Serialize, Deserialize)]
pub struct MsgRound3 {
    pub suspects: Vec<u16>,
    pub mac_tag: FieldElement,
}

impl MsgRound3 {
    pub fn mac_bytes(suspects: &[u16]) -> Vec<u8> {
        suspects.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}
