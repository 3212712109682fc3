use liun_field::FieldElement;
use rand_core::{CryptoRng, RngCore};
use round_based::{
    rounds_router::{simple_store::RoundInput, RoundsRouter},
    Delivery, Mpc, MpcParty, Outgoing,
};
use thiserror::Error;

use crate::{
    channel::{ChannelAuthority, NodeId},
    messages::{CrossEntry, Msg, MsgRound1, MsgRound2, MsgRound3},
    progress::Tracer,
};
use liun_field::Polynomial;

/// The result of a successful DKG run at a single committee member.
pub struct DkgOutput {
    /// `s_j = F_combined(j)`, this party's signing share.
    pub signing_share: FieldElement,
    /// This party's verification-share block: public evaluation arguments
    /// `v_1..v_m` (disjoint from every other party's block) and their
    /// `F_combined(v)` values, `|block| > degree`.
    pub verification_shares: Vec<(FieldElement, FieldElement)>,
    /// Contributors excluded by complaint-count aggregation (step 5).
    pub excluded: Vec<NodeId>,
    /// The degree `d = k - 1` of `F_combined`.
    pub degree: usize,
}

/// Builder for a single committee member's participation in one DKG run.
pub struct DkgBuilder<'a> {
    my_id: NodeId,
    committee: Vec<NodeId>,
    threshold: usize,
    epoch_id: u64,
    verification_points_per_member: usize,
    tracer: Option<&'a mut dyn Tracer>,
}

impl<'a> DkgBuilder<'a> {
    /// `committee` is ordered; each member's position is its round-based
    /// party index. `threshold` is `k`; the generated polynomial has degree
    /// `k - 1`.
    pub fn new(my_id: NodeId, committee: Vec<NodeId>, threshold: usize, epoch_id: u64) -> Self {
        let degree = threshold.saturating_sub(1);
        Self {
            my_id,
            committee,
            threshold,
            epoch_id,
            verification_points_per_member: degree + 2,
            tracer: None,
        }
    }

    pub fn set_verification_points_per_member(mut self, m: usize) -> Self {
        self.verification_points_per_member = m;
        self
    }

    pub fn set_progress_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub async fn run<R, M, A>(
        self,
        rng: &mut R,
        party: M,
        authority: &A,
    ) -> Result<DkgOutput, DkgError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = Msg>,
        A: ChannelAuthority,
    {
        run_dkg(
            rng,
            party,
            self.my_id,
            self.committee,
            self.threshold,
            self.epoch_id,
            self.verification_points_per_member,
            authority,
            self.tracer,
        )
        .await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_dkg<R, M, A>(
    rng: &mut R,
    party: M,
    my_id: NodeId,
    committee: Vec<NodeId>,
    threshold: usize,
    epoch_id: u64,
    m_points: usize,
    authority: &A,
    mut tracer: Option<&mut dyn Tracer>,
) -> Result<DkgOutput, DkgError<M::ReceiveError, M::SendError>>
where
    R: RngCore + CryptoRng,
    M: Mpc<ProtocolMessage = Msg>,
    A: ChannelAuthority,
{
    tracer.protocol_begins();

    let n = u16::try_from(committee.len()).map_err(|_| Bug::TooManyParties)?;
    let degree = threshold
        .checked_sub(1)
        .ok_or(Bug::ThresholdMustBePositive)?;
    let my_index = committee
        .iter()
        .position(|&id| id == my_id)
        .ok_or(Bug::SelfNotInCommittee)?;
    let my_index = u16::try_from(my_index).map_err(|_| Bug::TooManyParties)?;
    // Honest-majority exclusion threshold: t < n/3.
    let complaint_threshold = (usize::from(n).saturating_sub(1)) / 3;

    tracer.stage("Setup networking");
    let MpcParty { delivery, .. } = party.into_party();
    let (incomings, mut outgoings) = delivery.split();

    let mut rounds = RoundsRouter::<Msg>::builder();
    let round1 = rounds.add_round(RoundInput::<MsgRound1>::p2p(my_index, n));
    let round2 = rounds.add_round(RoundInput::<MsgRound2>::p2p(my_index, n));
    let round3 = rounds.add_round(RoundInput::<MsgRound3>::p2p(my_index, n));
    let mut rounds = rounds.listen(incomings);

    // Deterministic, disjoint verification-argument blocks per committee
    // member, derived from the epoch id so all parties agree on them without
    // a round trip (Open Question resolution, see DESIGN.md).
    let verification_args: Vec<Vec<FieldElement>> = (0..n)
        .map(|idx| verification_args_for(epoch_id, idx, m_points))
        .collect();
    let my_verification_args = &verification_args[usize::from(my_index)];

    // --- Round 1: contribute + distribute ---
    tracer.round_begins();
    tracer.stage("Sample contribution polynomial f_i");
    let secret_seed = FieldElement::random(rng);
    let my_poly = Polynomial::random_with_constant_term(rng, degree, secret_seed);

    tracer.send_msg();
    for (j, &peer) in committee.iter().enumerate() {
        if j == usize::from(my_index) {
            continue;
        }
        let value = my_poly.eval(committee[j]);
        let mut verification_values = Vec::with_capacity(verification_args[j].len());
        for &v in &verification_args[j] {
            verification_values.push(my_poly.eval(v));
        }
        let mac_payload = MsgRound1::mac_bytes(value, &verification_values);
        let mac_tag = authority.mac(peer, &mac_payload);
        outgoings
            .send(Outgoing::p2p(
                j as u16,
                Msg::Round1(MsgRound1 {
                    value,
                    mac_tag,
                    verification_values,
                }),
            ))
            .await
            .map_err(DkgError::SendError)?;
    }
    tracer.msg_sent();

    tracer.receive_msgs();
    let round1_msgs = rounds.complete(round1).await.map_err(DkgError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Verify round 1 MACs");
    let mut mac_failures: Vec<NodeId> = Vec::new();
    for (j, msg) in round1_msgs.iter_indexed() {
        let peer = committee[usize::from(j)];
        let ok = authority.verify_mac(
            peer,
            &MsgRound1::mac_bytes(msg.value, &msg.verification_values),
            authority.run_idx(peer),
            msg.mac_tag,
        );
        if !ok {
            mac_failures.push(peer);
        }
    }

    // my own received value/verification values from contributor i=my_index
    // are simply my own evaluations (never sent over the wire).
    let my_share_from_me = my_poly.eval(my_id);
    let my_verification_from_me: Vec<FieldElement> =
        my_verification_args.iter().map(|&v| my_poly.eval(v)).collect();

    // --- Round 2: cross-verify ---
    tracer.round_begins();
    tracer.stage("Forward received shares for cross-verification");
    tracer.send_msg();
    for (k, &k_peer) in committee.iter().enumerate() {
        if k == usize::from(my_index) {
            continue;
        }
        let mut entries = Vec::with_capacity(committee.len());
        entries.push(CrossEntry {
            contributor: my_index,
            value: my_share_from_me,
        });
        for (j, msg) in round1_msgs.iter_indexed() {
            entries.push(CrossEntry {
                contributor: j,
                value: msg.value,
            });
        }
        let mac_payload = MsgRound2::mac_bytes(&entries);
        let mac_tag = authority.mac(k_peer, &mac_payload);
        outgoings
            .send(Outgoing::p2p(k as u16, Msg::Round2(MsgRound2 { entries, mac_tag })))
            .await
            .map_err(DkgError::SendError)?;
    }
    tracer.msg_sent();

    tracer.receive_msgs();
    let round2_msgs = rounds.complete(round2).await.map_err(DkgError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Verify round 2 MACs");
    for (j, msg) in round2_msgs.iter_indexed() {
        let peer = committee[usize::from(j)];
        let ok = authority.verify_mac(peer, &MsgRound2::mac_bytes(&msg.entries), authority.run_idx(peer), msg.mac_tag);
        if !ok {
            mac_failures.push(peer);
        }
    }

    // --- Local consistency: for each contributor, collect cross-verified
    // points reported by every forwarder and check they lie on one curve. ---
    tracer.stage("Local consistency check");
    let mut suspects: Vec<u16> = Vec::new();
    for contributor in 0..n {
        if contributor == my_index {
            continue;
        }
        // One point per forwarder: forwarder's own node-id as x, the value
        // it reports having received from `contributor` as y.
        let mut points: Vec<liun_field::Point> = Vec::new();
        // Forwarder == me: the value I received directly from `contributor`.
        if let Some(msg) = round1_msgs.iter_indexed().find(|(j, _)| *j == contributor) {
            points.push(liun_field::Point::new(my_id, msg.1.value));
        }
        // Forwarder == every other party that relayed to me in round 2.
        for (forwarder_idx, msg) in round2_msgs.iter_indexed() {
            if let Some(entry) = msg.entries.iter().find(|e| e.contributor == contributor) {
                let forwarder_id = committee[usize::from(forwarder_idx)];
                points.push(liun_field::Point::new(forwarder_id, entry.value));
            }
        }

        if points.len() < degree + 2 {
            // Insufficient redundancy for a single-round verdict; skip
            // rather than falsely accuse.
            continue;
        }
        let (basis, rest) = points.split_at(degree + 1);
        if rest
            .iter()
            .any(|p| liun_field::lagrange_interpolate_at(basis, p.x).map(|v| v != p.y).unwrap_or(true))
        {
            suspects.push(contributor);
        }
    }
    if !mac_failures.is_empty() {
        return Err(DkgError::MacFailure(mac_failures));
    }

    // --- Round 3: aggregate complaints ---
    tracer.round_begins();
    tracer.stage("Broadcast local suspect set");
    tracer.send_msg();
    for (k, &k_peer) in committee.iter().enumerate() {
        if k == usize::from(my_index) {
            continue;
        }
        let mac_payload = MsgRound3::mac_bytes(&suspects);
        let mac_tag = authority.mac(k_peer, &mac_payload);
        outgoings
            .send(Outgoing::p2p(
                k as u16,
                Msg::Round3(MsgRound3 {
                    suspects: suspects.clone(),
                    mac_tag,
                }),
            ))
            .await
            .map_err(DkgError::SendError)?;
    }
    tracer.msg_sent();

    tracer.receive_msgs();
    let round3_msgs = rounds.complete(round3).await.map_err(DkgError::ReceiveMessage)?;
    tracer.msgs_received();

    tracer.stage("Aggregate complaints and compute exclusion set");
    let mut complaint_counts = vec![0usize; usize::from(n)];
    for c in &suspects {
        complaint_counts[usize::from(*c)] += 1;
    }
    for (_, msg) in round3_msgs.iter_indexed() {
        for c in &msg.suspects {
            complaint_counts[usize::from(*c)] += 1;
        }
    }
    let excluded_indices: Vec<u16> = (0..n)
        .filter(|&idx| complaint_counts[usize::from(idx)] > complaint_threshold)
        .collect();
    let excluded: Vec<NodeId> = excluded_indices.iter().map(|&idx| committee[usize::from(idx)]).collect();

    // --- Combined share and verification shares ---
    tracer.stage("Compute combined signing share");
    let mut signing_share = FieldElement::ZERO;
    if !excluded_indices.contains(&my_index) {
        signing_share = signing_share.add(my_share_from_me);
    }
    for (j, msg) in round1_msgs.iter_indexed() {
        if !excluded_indices.contains(&j) {
            signing_share = signing_share.add(msg.value);
        }
    }

    tracer.stage("Compute verification shares");
    let mut verification_shares = Vec::with_capacity(my_verification_args.len());
    for (vi, &v) in my_verification_args.iter().enumerate() {
        let mut total = FieldElement::ZERO;
        if !excluded_indices.contains(&my_index) {
            total = total.add(my_verification_from_me[vi]);
        }
        for (j, msg) in round1_msgs.iter_indexed() {
            if !excluded_indices.contains(&j) {
                total = total.add(msg.verification_values[vi]);
            }
        }
        verification_shares.push((v, total));
    }

    tracer.protocol_ends();
    Ok(DkgOutput {
        signing_share,
        verification_shares,
        excluded,
        degree,
    })
}

/// Deterministic, disjoint verification-argument block for committee member
/// `party_index`, derived from the epoch id so every party can compute every
/// other party's block locally (no extra round needed).
fn verification_args_for(epoch_id: u64, party_index: u16, m: usize) -> Vec<FieldElement> {
    let base: u64 = 1_000_000_000u64
        .wrapping_add(epoch_id.wrapping_mul(1_000_000))
        .wrapping_add(u64::from(party_index).wrapping_mul(1_000));
    (1..=m as u64).map(|offset| FieldElement::new(base.wrapping_add(offset))).collect()
}

/// Error surfaced by a DKG round. DKG is not cancelable past distribution;
/// any of these aborts the run and leaves the previous epoch (if any) in
/// force.
#[derive(Debug, Error)]
pub enum DkgError<IErr, OErr> {
    #[error("receive message")]
    ReceiveMessage(
        #[source]
        round_based::rounds_router::CompleteRoundError<round_based::rounds_router::simple_store::RoundInputError, IErr>,
    ),
    #[error("send message")]
    SendError(#[source] OErr),
    #[error("MAC verification failed for contributors: {0:?}")]
    MacFailure(Vec<NodeId>),
    #[error("internal error")]
    InternalError(#[from] Bug),
}

/// Unexpected error not caused by another party's misbehavior.
#[derive(Debug, Error)]
pub enum Bug {
    #[error("too many parties for a u16 party index")]
    TooManyParties,
    #[error("threshold k must be at least 1")]
    ThresholdMustBePositive,
    #[error("local node id is not a member of its own committee")]
    SelfNotInCommittee,
}
