//! The orchestrator: owns identity, channels, overlay, the trust cache, and
//! the current epoch, and exposes the node's external API.
//!
//! Resolves the cyclic `ChannelTable <-> Overlay <-> Node` reference by
//! making [`Node`] the sole owner of everything below it; every other
//! component keys by [`NodeId`] rather than holding a reference back up.

use liun_dkg::Msg as DkgMsg;
use liun_field::FieldElement;
use rand_core::{CryptoRng, RngCore};
use round_based::Mpc;
use thiserror::Error;
use tracing::info;

use crate::bootstrap::{self, BootstrapError, Candidate, Route};
use crate::channel::{KeyChannel, NodeChannels, NodeId};
use crate::config::NodeConfig;
use crate::epoch::{EpochConfig, EpochError, EpochManager, NoSuccessorReady};
use crate::intro::{self, IntroComponent, IntroError};
use crate::overlay::{GossipEdge, GraphHealth, InsufficientMutualContacts, Overlay};
use crate::trust::{self, TrustVector};
use crate::uss::{self, CombineError, DisputeVerdict, PartialSignature, SignError, Signature, VerifyOutcome};

/// Errors surfaced by [`Node`]'s orchestration methods, aggregating every
/// sub-component's error: field and Shamir layers propagate unchanged, while
/// protocol-layer failures are reported to the orchestrator.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    InsufficientMutualContacts(#[from] InsufficientMutualContacts),
    #[error(transparent)]
    Intro(#[from] IntroError),
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error(transparent)]
    Combine(#[from] CombineError),
    /// No epoch has ever succeeded: the node must call `advance_epoch`
    /// before it can sign or verify.
    #[error("node has no active epoch; call advance_epoch first")]
    NoEpoch,
}

/// A single identity's view of the whole Liun protocol stack. Generic only
/// where DKG forces it (`advance_epoch`); everything else is synchronous,
/// in-memory algebra plus protocol message handling over an abstract
/// channel.
pub struct Node {
    id: NodeId,
    config: NodeConfig,
    channels: NodeChannels,
    overlay: Overlay,
    trust: Option<TrustVector>,
    epoch: Option<EpochManager>,
    tick: u64,
}

impl Node {
    pub fn new(id: NodeId, config: NodeConfig) -> Self {
        Node {
            id,
            config,
            channels: NodeChannels::new(),
            overlay: Overlay::new(id),
            trust: None,
            epoch: None,
            tick: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Advances this node's logical clock by one. Every tick-stamped fact in
    /// this crate uses this counter rather than persisted wall time.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Bootstraps channels to every candidate in `candidates` whose routes
    /// come up clean, recording each opened channel in both the channel set
    /// and the overlay.
    pub fn bootstrap<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        candidates: &[(Candidate, Vec<Route>)],
    ) -> Result<Vec<NodeId>, NodeError> {
        let channels = bootstrap::bootstrap(rng, candidates, self.config.bootstrap.psk_len)?;
        let mut opened = Vec::with_capacity(channels.len());
        for channel in channels {
            let peer = channel.peer_id();
            self.channels.insert(channel);
            self.overlay.open_channel(peer, self.tick);
            opened.push(peer);
        }
        info!(node = self.id.value(), opened = opened.len(), "bootstrap complete");
        Ok(opened)
    }

    /// Completes introduction to `target` via `components` already gathered
    /// from mutual contacts. Requires at least [`intro::MIN_INTRODUCERS`]
    /// mutual contacts to exist in the overlay first, independent of how
    /// many components were actually supplied.
    pub fn introduce_to<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        target: NodeId,
        components: &[IntroComponent],
        psk_len: usize,
    ) -> Result<NodeId, NodeError> {
        self.overlay.find_mutual_contacts(target, intro::MIN_INTRODUCERS)?;
        let channel = intro::introduce(rng, target, components, psk_len)?;
        self.channels.insert(channel);
        self.overlay.open_channel(target, self.tick);
        info!(node = self.id.value(), peer = target.value(), "peer introduction complete");
        Ok(target)
    }

    /// Starts the first epoch, or — if one is already active — runs overlap
    /// DKG for its successor and immediately cuts over. Uses this node's own
    /// channel set as the DKG's [`liun_dkg::ChannelAuthority`], so MAC
    /// verification during DKG goes through the exact same channels
    /// `sign`/`verify` later rely on.
    pub async fn advance_epoch<R, M>(
        &mut self,
        rng: &mut R,
        committee: Vec<NodeId>,
        config: EpochConfig,
        party: M,
    ) -> Result<u64, EpochError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = DkgMsg>,
    {
        match self.epoch.as_mut() {
            None => {
                let manager = EpochManager::start_epoch(self.id, committee, config, 0, rng, party, &self.channels).await?;
                let id = manager.current_epoch_id();
                self.epoch = Some(manager);
                Ok(id)
            }
            Some(manager) => {
                manager.begin_overlap(rng, party, &self.channels).await?;
                // begin_overlap only returns Ok when a successor was
                // installed, so the immediately following cutover cannot
                // fail with NoSuccessorReady.
                let id = manager
                    .cutover(self.tick)
                    .unwrap_or_else(|NoSuccessorReady| unreachable!("begin_overlap just installed a successor"));
                Ok(id)
            }
        }
    }

    /// Signs `message` against the current epoch.
    pub fn sign(&mut self, message: FieldElement, committee: &[NodeId]) -> Result<PartialSignature, NodeError> {
        let tick = self.tick;
        let manager = self.epoch.as_mut().ok_or(NodeError::NoEpoch)?;
        Ok(manager.sign(message, committee, tick)?)
    }

    /// Combines partial signatures into the final signature. Pure: does not
    /// require an active epoch at this node (a coordinator gathering
    /// partials from a committee may not itself be a signer).
    pub fn combine(&self, partials: &[PartialSignature], k: usize) -> Result<Signature, NodeError> {
        Ok(uss::combine(partials, k)?)
    }

    /// Verifies `signature` against `message` using this epoch's
    /// verification shares.
    pub fn verify(&self, message: FieldElement, signature: Signature) -> Result<VerifyOutcome, NodeError> {
        let manager = self.epoch.as_ref().ok_or(NodeError::NoEpoch)?;
        Ok(manager.verify(message, signature))
    }

    /// Resolves a disputed signature by trust-weighted vote, recomputing
    /// this node's trust vector first.
    pub fn resolve_dispute(&mut self, reports: &[(NodeId, bool)]) -> DisputeVerdict {
        let trust = self.recompute_trust();
        uss::resolve_dispute(reports, trust)
    }

    /// Recomputes this node's personalized-PageRank trust vector from an
    /// immutable snapshot of its current overlay graph and caches it.
    pub fn recompute_trust(&mut self) -> &TrustVector {
        let vector = trust::personalized_pagerank(self.overlay.graph(), self.id, self.config.trust.damping, self.config.trust.iterations);
        self.trust = Some(vector);
        self.trust.as_ref().expect("just assigned")
    }

    pub fn trust_vector(&self) -> Option<&TrustVector> {
        self.trust.as_ref()
    }

    /// Test/simulation helper: records a direct edge to `peer` in the
    /// overlay graph without driving an actual bootstrap handshake, for
    /// trust scenarios that only care about the resulting graph shape.
    pub fn overlay_bootstrap_edge_for_test(&mut self, peer: NodeId) {
        self.overlay.open_channel(peer, self.tick);
    }

    /// Test/simulation helper: ingests a gossiped edge between `a` and `b`
    /// (not necessarily touching this node) directly into the overlay graph,
    /// standing in for the gossip transport proper.
    pub fn overlay_gossip_edge_for_test(&mut self, a: NodeId, b: NodeId) {
        self.overlay.ingest_gossip(GossipEdge { origin: a, a, b, weight: 1.0 });
    }

    pub fn check_overlay_health(&mut self) -> GraphHealth {
        self.overlay.check_health(self.config.overlay.dkg_dense)
    }

    /// Whether the current epoch's budget has crossed the overlap watermark;
    /// the caller decides when to actually call `advance_epoch` in response.
    pub fn should_begin_overlap(&self) -> bool {
        self.epoch.as_ref().map(|e| e.should_begin_overlap()).unwrap_or(false)
    }

    pub fn current_epoch_id(&self) -> Option<u64> {
        self.epoch.as_ref().map(|e| e.current_epoch_id())
    }

    pub fn budget_remaining(&self) -> Option<usize> {
        self.epoch.as_ref().map(|e| e.budget_remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::CandidateMetadata;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn n(v: u64) -> NodeId {
        FieldElement::new(v)
    }

    fn clean_routes(count: usize) -> Vec<Route> {
        vec![Route { corrupted: false }; count]
    }

    #[test]
    fn bootstrap_opens_channels_and_records_them_in_overlay() {
        let mut node = Node::new(n(1), NodeConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let candidates = vec![(
            Candidate {
                id: n(2),
                metadata: CandidateMetadata {
                    route_prefix: "a".into(),
                    jurisdiction: "x".into(),
                },
            },
            clean_routes(9),
        )];

        let opened = node.bootstrap(&mut rng, &candidates).unwrap();
        assert_eq!(opened, vec![n(2)]);
        assert_eq!(node.overlay().table().active_peers(), vec![n(2)]);
        assert_eq!(node.overlay().graph().neighbors(n(1)), vec![n(2)]);
    }

    #[test]
    fn sign_before_any_epoch_fails_with_no_epoch() {
        let mut node = Node::new(n(1), NodeConfig::default());
        let err = node.sign(FieldElement::new(5), &[n(1), n(2), n(3)]).unwrap_err();
        assert!(matches!(err, NodeError::NoEpoch));
    }

    #[test]
    fn introduce_to_requires_mutual_contacts_first() {
        let mut node = Node::new(n(1), NodeConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let components = vec![]; // irrelevant: fails before they're even combined
        let err = node.introduce_to(&mut rng, n(99), &components, 40).unwrap_err();
        assert!(matches!(err, NodeError::InsufficientMutualContacts(_)));
    }

    #[test]
    fn resolve_dispute_recomputes_trust_from_current_overlay() {
        let mut node = Node::new(n(1), NodeConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let candidates = vec![(
            Candidate {
                id: n(2),
                metadata: CandidateMetadata {
                    route_prefix: "a".into(),
                    jurisdiction: "x".into(),
                },
            },
            clean_routes(9),
        )];
        node.bootstrap(&mut rng, &candidates).unwrap();

        let reports = [(n(2), true)];
        // With only one known peer and no trust data beyond the seed itself,
        // the result is deterministic but not asserted on the vote itself —
        // this test only checks that resolving a dispute doesn't panic and
        // populates the trust cache.
        let _ = node.resolve_dispute(&reports);
        assert!(node.trust_vector().is_some());
    }
}
