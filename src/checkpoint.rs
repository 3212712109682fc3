//! Optional node checkpointing: persisting `(identity, current signing
//! share, verification shares, epoch id, channel table)` across restarts.
//! Format is otherwise ours to choose; the one hard constraint is that the
//! signing share is never written in plaintext.
//!
//! This implements that constraint by running the signing share (and nothing
//! else — the rest of the checkpoint is already public or semi-public
//! information) through [`crate::expand::expand_psk`] keyed by a caller-supplied
//! passphrase, XORing it into a keystream the way [`crate::intro`] XORs PSK
//! components. This is a checkpoint-at-rest format, not a wire protocol, so it
//! carries no MAC of its own; a caller wanting tamper-evidence should store it
//! behind a filesystem that already guarantees integrity.

use crate::epoch::EpochManager;
use liun_field::FieldElement;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::channel::NodeId;
use crate::expand::expand_psk;
use crate::overlay::ChannelTable;

/// One frozen channel-table row, restorable without re-running discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTableCheckpoint {
    pub peer: u64,
    pub status_active: bool,
    pub last_used_tick: u64,
}

/// The on-disk checkpoint format. `signing_share_ciphertext` is the current
/// epoch's signing share XORed with a passphrase-derived keystream — never
/// the plaintext field value.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCheckpoint {
    pub node_id: u64,
    pub epoch_id: u64,
    pub degree: usize,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub signing_share_ciphertext: Vec<u8>,
    pub verification_shares: Vec<(u64, u64)>,
    pub channel_table: Vec<ChannelTableCheckpoint>,
}

/// Encrypts `share` under `passphrase` by XORing its 8-byte little-endian
/// encoding with an [`expand_psk`] keystream. Symmetric: the same function
/// called again on the ciphertext with the same passphrase recovers the
/// plaintext bytes.
fn xor_share(share: FieldElement, passphrase: &[u8]) -> Vec<u8> {
    let keystream = expand_psk(passphrase, 8);
    let plain = share.value().to_le_bytes();
    plain.iter().zip(keystream.iter()).map(|(&a, &b)| a ^ b).collect()
}

fn unxor_share(ciphertext: &[u8], passphrase: &[u8]) -> Option<FieldElement> {
    if ciphertext.len() != 8 {
        return None;
    }
    let keystream = expand_psk(passphrase, 8);
    let mut bytes = [0u8; 8];
    for i in 0..8 {
        bytes[i] = ciphertext[i] ^ keystream[i];
    }
    Some(FieldElement::new(u64::from_le_bytes(bytes)))
}

/// Builds a checkpoint of `manager`'s current epoch and `table`, encrypting
/// the signing share under `passphrase`. Verification shares and the channel
/// table are public evaluation arguments, not secret, and are stored
/// as-is.
pub fn checkpoint(node_id: NodeId, manager: &EpochManager, table: &ChannelTable, passphrase: &[u8]) -> NodeCheckpoint {
    NodeCheckpoint {
        node_id: node_id.value(),
        epoch_id: manager.current_epoch_id(),
        degree: manager.current_degree(),
        signing_share_ciphertext: xor_share(manager.signing_share(), passphrase),
        verification_shares: manager
            .verification_shares()
            .iter()
            .map(|&(x, y)| (x.value(), y.value()))
            .collect(),
        channel_table: table
            .entries()
            .map(|e| ChannelTableCheckpoint {
                peer: e.peer.value(),
                status_active: e.status == crate::channel::ChannelState::Active,
                last_used_tick: e.last_used_tick,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error("checkpoint signing-share ciphertext has the wrong length")]
    MalformedCiphertext,
}

/// Recovers the signing share from a checkpoint given the same passphrase it
/// was written with. Does not reconstruct the rest of [`crate::node::Node`]'s
/// state — that's the caller's job, using the other (non-secret) fields.
pub fn recover_signing_share(checkpoint: &NodeCheckpoint, passphrase: &[u8]) -> Result<FieldElement, RestoreError> {
    unxor_share(&checkpoint.signing_share_ciphertext, passphrase).ok_or(RestoreError::MalformedCiphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_round_trips_the_signing_share() {
        let share = FieldElement::new(123_456_789);
        let ciphertext = xor_share(share, b"node-local-passphrase");
        let recovered = unxor_share(&ciphertext, b"node-local-passphrase").unwrap();
        assert_eq!(recovered, share);
    }

    #[test]
    fn wrong_passphrase_does_not_recover_the_share() {
        let share = FieldElement::new(42);
        let ciphertext = xor_share(share, b"correct-passphrase");
        let wrong = unxor_share(&ciphertext, b"incorrect-passphrase").unwrap();
        assert_ne!(wrong, share);
    }

    #[test]
    fn ciphertext_never_equals_the_plaintext_encoding() {
        let share = FieldElement::new(999);
        let ciphertext = xor_share(share, b"some-passphrase");
        assert_ne!(ciphertext, share.value().to_le_bytes().to_vec());
    }
}
