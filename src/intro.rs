//! Peer-introduction protocol: `m` mutual contacts each contribute a
//! uniform PSK component; XOR-combining them gives a fresh shared secret
//! that stays ε-close to uniform as long as at least one introducer is
//! honest, regardless of topology.

use crate::channel::{NodeId, SimulatedChannel};
use crate::expand::{expand_psk, xor_bytes};
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;
use zeroize::Zeroize;

/// The minimum mutual-contact count peer introduction requires.
pub const MIN_INTRODUCERS: usize = 3;

/// The 256-bit PSK component contributed by one introducer. Zeroized on
/// drop since it's secret material, as are all raw key bytes upstream of
/// channel establishment.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct IntroComponent {
    pub introducer: NodeId,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntroError {
    #[error("peer introduction needs at least {min} introducers, got {got}")]
    TooFewIntroducers { got: usize, min: usize },
    #[error("introducer components have mismatched lengths")]
    MismatchedComponentLengths,
}

/// Samples a fresh 32-byte PSK component as an introducer would.
pub fn sample_component<R: RngCore + CryptoRng>(rng: &mut R, introducer: NodeId) -> IntroComponent {
    let mut bytes = vec![0u8; 32];
    rng.fill_bytes(&mut bytes);
    IntroComponent { introducer, bytes }
}

/// XOR-combines every introducer's component into `PSK_AC`. Requires at
/// least [`MIN_INTRODUCERS`] components, all the same length.
pub fn combine_components(components: &[IntroComponent]) -> Result<Vec<u8>, IntroError> {
    if components.len() < MIN_INTRODUCERS {
        return Err(IntroError::TooFewIntroducers {
            got: components.len(),
            min: MIN_INTRODUCERS,
        });
    }
    let len = components[0].bytes.len();
    if components.iter().any(|c| c.bytes.len() != len) {
        return Err(IntroError::MismatchedComponentLengths);
    }
    let combined = components
        .iter()
        .skip(1)
        .fold(components[0].bytes.clone(), |acc, c| xor_bytes(&acc, &c.bytes));
    Ok(combined)
}

/// Completes introduction to `peer`: combines `components` into `PSK_AC`,
/// expands it to `psk_len` bytes, and opens the direct channel. Both sides
/// independently call this with their own view of the same components and
/// arrive at byte-identical channels.
pub fn introduce<R: RngCore + CryptoRng>(
    _rng: &mut R,
    peer: NodeId,
    components: &[IntroComponent],
    psk_len: usize,
) -> Result<SimulatedChannel, IntroError> {
    let combined = combine_components(components)?;
    let psk = expand_psk(&combined, psk_len);
    Ok(SimulatedChannel::open(peer, &psk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::KeyChannel;
    use liun_field::FieldElement;

    fn vector_component(introducer: u64, byte: u8) -> IntroComponent {
        IntroComponent {
            introducer: FieldElement::new(introducer),
            bytes: vec![byte; 32],
        }
    }

    #[test]
    fn scenario_s4_fixed_test_vectors_xor_to_zero() {
        let components = vec![
            vector_component(1, 0x01),
            vector_component(2, 0x02),
            vector_component(3, 0x03),
        ];
        let combined = combine_components(&components).unwrap();
        assert_eq!(combined, vec![0x00u8; 32]);
    }

    #[test]
    fn a_and_c_derive_the_same_channel_from_the_same_components() {
        let mut rng = rand_chacha::ChaCha20Rng::from_seed([7u8; 32]);
        use rand_core::SeedableRng;
        let components = vec![
            vector_component(1, 0x10),
            vector_component(2, 0x20),
            vector_component(3, 0x30),
        ];
        let peer = FieldElement::new(42);
        let mut a_side = introduce(&mut rng, peer, &components, 40).unwrap();
        let mut c_side = introduce(&mut rng, peer, &components, 40).unwrap();
        assert_eq!(
            a_side.generate_key_bytes(16).unwrap(),
            c_side.generate_key_bytes(16).unwrap()
        );
    }

    #[test]
    fn fewer_than_three_introducers_is_rejected() {
        let components = vec![vector_component(1, 0x01), vector_component(2, 0x02)];
        assert_eq!(
            combine_components(&components),
            Err(IntroError::TooFewIntroducers { got: 2, min: 3 })
        );
    }

    #[test]
    fn changing_any_single_component_changes_the_combined_secret() {
        let base = vec![vector_component(1, 0x01), vector_component(2, 0x02), vector_component(3, 0x03)];
        let baseline = combine_components(&base).unwrap();

        let mut perturbed = base.clone();
        perturbed[1] = vector_component(2, 0x99);
        let changed = combine_components(&perturbed).unwrap();

        assert_ne!(baseline, changed);
    }
}
