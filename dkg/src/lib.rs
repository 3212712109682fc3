//! Distributed key generation for Liun's unconditionally-secure threshold
//! signatures: contribution, ITS-channel cross-verification,
//! corrupt-contributor exclusion, and combined-share / verification-share
//! output, run as a `round-based` protocol.

mod channel;
mod messages;
mod progress;
mod protocol;

pub use channel::{ChannelAuthority, NodeId};
pub use messages::{CrossEntry, Msg, MsgRound1, MsgRound2, MsgRound3};
pub use progress::{RecordingTracer, Tracer};
pub use protocol::{Bug, DkgBuilder, DkgError, DkgOutput};

#[cfg(test)]
mod tests {
    use super::*;
    use liun_field::FieldElement;
    use rand_core::SeedableRng;
    use round_based::simulation::Simulation;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A trivial, always-correct channel authority for tests: MACs are the
    /// sum of the data bytes folded into a field element, which is enough to
    /// exercise the verify path without modeling a real ITS channel.
    struct TestAuthority {
        run_idx: Mutex<HashMap<u64, u64>>,
    }

    impl TestAuthority {
        fn new() -> Self {
            TestAuthority {
                run_idx: Mutex::new(HashMap::new()),
            }
        }

        fn tag(data: &[u8]) -> FieldElement {
            let mut acc: u64 = 0;
            for chunk in data.chunks(8) {
                let mut buf = [0u8; 8];
                buf[..chunk.len()].copy_from_slice(chunk);
                acc = acc.wrapping_add(u64::from_le_bytes(buf));
            }
            FieldElement::new(acc)
        }
    }

    impl ChannelAuthority for TestAuthority {
        fn run_idx(&self, peer: NodeId) -> u64 {
            *self.run_idx.lock().unwrap().get(&peer.value()).unwrap_or(&0)
        }
        fn mac(&self, _peer: NodeId, data: &[u8]) -> FieldElement {
            Self::tag(data)
        }
        fn verify_mac(&self, _peer: NodeId, data: &[u8], _run_idx: u64, tag: FieldElement) -> bool {
            Self::tag(data) == tag
        }
    }

    #[tokio::test]
    async fn five_party_dkg_produces_consistent_combined_share() {
        let n = 5usize;
        let k = 3usize;
        let committee: Vec<NodeId> = (1..=n as u64).map(FieldElement::new).collect();

        let mut simulation = Simulation::<Msg>::new();
        let mut outputs_futures = Vec::new();
        for (idx, &id) in committee.iter().enumerate() {
            let party = simulation.add_party();
            let committee = committee.clone();
            let authority = TestAuthority::new();
            let fut = async move {
                let mut rng = rand_chacha::ChaCha20Rng::from_seed([idx as u8; 32]);
                DkgBuilder::new(id, committee, k, 0)
                    .run(&mut rng, party, &authority)
                    .await
                    .expect("dkg succeeds")
            };
            outputs_futures.push(fut);
        }
        let outputs: Vec<DkgOutput> = futures::future::join_all(outputs_futures).await;

        // Any k of the n signing shares should Lagrange-interpolate to a
        // value consistent across committees (the invariant `s_j = F(j)`
        // for a single combined polynomial of degree k-1).
        let points: Vec<liun_field::Point> = committee
            .iter()
            .zip(outputs.iter())
            .take(k)
            .map(|(&id, out)| liun_field::Point::new(id, out.signing_share))
            .collect();
        let at_zero = liun_field::lagrange_interpolate_at(&points, FieldElement::ZERO).unwrap();

        let other_points: Vec<liun_field::Point> = committee
            .iter()
            .zip(outputs.iter())
            .skip(1)
            .take(k)
            .map(|(&id, out)| liun_field::Point::new(id, out.signing_share))
            .collect();
        let at_zero_other = liun_field::lagrange_interpolate_at(&other_points, FieldElement::ZERO).unwrap();

        assert_eq!(at_zero, at_zero_other);
        for out in &outputs {
            assert!(out.excluded.is_empty());
            assert_eq!(out.degree, k - 1);
            assert!(out.verification_shares.len() > out.degree);
        }
    }
}
