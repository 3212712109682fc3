//! Epoch lifecycle: DKG re-deal scheduling, the overlap window, and
//! signature-budget-driven rotation.
//!
//! An [`Epoch`] is the lifetime of a single signing polynomial `F_epoch`;
//! [`EpochManager`] is the state machine that starts one via DKG, watches its
//! [`SignatureBudget`], runs a successor's DKG concurrently once the budget
//! nears exhaustion ("overlap"), and cuts over to it without a signing gap.

use liun_dkg::{ChannelAuthority, DkgBuilder, DkgError, NodeId};
use liun_field::FieldElement;
use rand_core::{CryptoRng, RngCore};
use round_based::Mpc;
use thiserror::Error;
use tracing::info;
use zeroize::Zeroize;

use crate::uss::{self, CombineError, PartialSignature, SignError, Signature, SignatureBudget, VerifyOutcome};

/// Tunable epoch parameters: a typed struct the caller constructs, not a
/// scattered literal.
#[derive(Debug, Clone, Copy)]
pub struct EpochConfig {
    pub degree: usize,
    pub threshold: usize,
    /// Fraction of the signature budget consumed at which overlap begins
    /// (`budget_consumed >= overlap_watermark * budget_max`).
    pub overlap_watermark: f64,
    /// Logical ticks the outgoing epoch remains verifiable after cutover.
    pub grace_period_ticks: u64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        EpochConfig {
            degree: 2,
            threshold: 3,
            overlap_watermark: 0.8,
            grace_period_ticks: 10,
        }
    }
}

/// A single signing polynomial's lifetime at this node: its id, the local
/// signing/verification shares DKG produced, and its signature budget.
///
/// The signing share is zeroized when the epoch is dropped: it must never
/// leak in plaintext, which extends, in spirit, to not lingering in memory
/// past its useful life.
pub struct Epoch {
    pub epoch_id: u64,
    pub degree: usize,
    pub signing_share: FieldElement,
    pub verification_shares: Vec<(FieldElement, FieldElement)>,
    pub excluded: Vec<NodeId>,
    pub budget: SignatureBudget,
}

impl Drop for Epoch {
    fn drop(&mut self) {
        self.signing_share.zeroize();
    }
}

impl Epoch {
    fn budget_consumed_ratio(&self) -> f64 {
        if self.budget.max() == 0 {
            return 1.0;
        }
        self.budget.used() as f64 / self.budget.max() as f64
    }
}

#[derive(Debug, Error)]
pub enum EpochError<IErr, OErr> {
    /// DKG for this epoch could not produce a combined polynomial; the
    /// previous epoch (if any) remains in force.
    #[error("DKG failed for epoch {epoch_id}")]
    DkgFailed {
        epoch_id: u64,
        #[source]
        source: DkgError<IErr, OErr>,
    },
    /// Overlap was requested while one was already in progress.
    #[error("overlap already in progress for epoch {0}")]
    OverlapAlreadyInProgress(u64),
}

/// `cutover` was called with no successor epoch ready. Not parameterized by
/// `IErr`/`OErr` since cutover never touches the DKG transport itself.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no successor epoch is ready to cut over to")]
pub struct NoSuccessorReady;

/// Runs the epoch lifecycle state machine at a single node. Not itself a
/// `round-based` party — each DKG run it triggers is.
pub struct EpochManager {
    my_id: NodeId,
    committee: Vec<NodeId>,
    config: EpochConfig,
    current: Epoch,
    /// `Some` while a successor epoch's DKG has completed but cutover hasn't
    /// happened yet.
    successor: Option<Epoch>,
    /// The epoch just cut over from, plus how many grace ticks remain before
    /// it freezes permanently.
    retiring: Option<(Epoch, u64)>,
}

impl EpochManager {
    /// Runs DKG to stand up the very first epoch.
    pub async fn start_epoch<R, M, A>(
        my_id: NodeId,
        committee: Vec<NodeId>,
        config: EpochConfig,
        epoch_id: u64,
        rng: &mut R,
        party: M,
        authority: &A,
    ) -> Result<Self, EpochError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = liun_dkg::Msg>,
        A: ChannelAuthority,
    {
        let output = DkgBuilder::new(my_id, committee.clone(), config.threshold, epoch_id)
            .run(rng, party, authority)
            .await
            .map_err(|source| EpochError::DkgFailed { epoch_id, source })?;

        info!(epoch_id, degree = output.degree, excluded = output.excluded.len(), "epoch started");
        Ok(EpochManager {
            my_id,
            committee,
            config,
            current: Epoch {
                epoch_id,
                degree: output.degree,
                signing_share: output.signing_share,
                verification_shares: output.verification_shares,
                excluded: output.excluded,
                budget: SignatureBudget::new(output.degree),
            },
            successor: None,
            retiring: None,
        })
    }

    pub fn current_epoch_id(&self) -> u64 {
        self.current.epoch_id
    }

    pub fn current_degree(&self) -> usize {
        self.current.degree
    }

    /// This node's signing share for the current epoch; this `Node`
    /// exclusively owns it. Exposed read-only for [`crate::checkpoint`];
    /// never logged or displayed.
    pub fn signing_share(&self) -> FieldElement {
        self.current.signing_share
    }

    /// The current epoch's verification shares — public evaluation
    /// arguments, not secret.
    pub fn verification_shares(&self) -> &[(FieldElement, FieldElement)] {
        &self.current.verification_shares
    }

    pub fn successor_epoch_id(&self) -> Option<u64> {
        self.successor.as_ref().map(|e| e.epoch_id)
    }

    /// True once the current epoch's budget has crossed the overlap
    /// watermark and no overlap is already running.
    pub fn should_begin_overlap(&self) -> bool {
        self.successor.is_none() && self.current.budget_consumed_ratio() >= self.config.overlap_watermark
    }

    /// Runs DKG for `epoch_id + 1` while `current` remains valid for
    /// signing, installing the result as [`Self::successor`] on success.
    /// New joiners during overlap should be handed shares of this successor
    /// only, never of `current`.
    pub async fn begin_overlap<R, M, A>(
        &mut self,
        rng: &mut R,
        party: M,
        authority: &A,
    ) -> Result<(), EpochError<M::ReceiveError, M::SendError>>
    where
        R: RngCore + CryptoRng,
        M: Mpc<ProtocolMessage = liun_dkg::Msg>,
        A: ChannelAuthority,
    {
        if self.successor.is_some() {
            return Err(EpochError::OverlapAlreadyInProgress(self.current.epoch_id));
        }
        let successor_epoch_id = self.current.epoch_id + 1;
        let output = DkgBuilder::new(self.my_id, self.committee.clone(), self.config.threshold, successor_epoch_id)
            .run(rng, party, authority)
            .await
            .map_err(|source| EpochError::DkgFailed {
                epoch_id: successor_epoch_id,
                source,
            })?;

        info!(epoch_id = successor_epoch_id, "overlap: successor epoch ready");
        self.successor = Some(Epoch {
            epoch_id: successor_epoch_id,
            degree: output.degree,
            signing_share: output.signing_share,
            verification_shares: output.verification_shares,
            excluded: output.excluded,
            budget: SignatureBudget::new(output.degree),
        });
        Ok(())
    }

    /// Switches signing to the successor epoch, retiring `current` into a
    /// grace window rather than dropping it immediately so in-flight
    /// verifications still succeed. Budget enforcement never resets
    /// mid-epoch, but cutover replaces the whole epoch rather than resetting
    /// the old one's counter.
    pub fn cutover(&mut self, tick: u64) -> Result<u64, NoSuccessorReady> {
        let successor = self.successor.take().ok_or(NoSuccessorReady)?;
        let old = std::mem::replace(&mut self.current, successor);
        let new_id = self.current.epoch_id;
        info!(from = old.epoch_id, to = new_id, "epoch cutover");
        self.retiring = Some((old, self.config.grace_period_ticks.saturating_add(tick)));
        Ok(new_id)
    }

    /// Freezes the retiring epoch once its grace window (an absolute tick
    /// deadline, not a countdown) has passed; a no-op before then or if
    /// there's nothing retiring.
    pub fn expire_grace(&mut self, tick: u64) {
        if let Some((epoch, deadline)) = &self.retiring {
            if tick >= *deadline {
                info!(epoch_id = epoch.epoch_id, "retiring epoch frozen");
                self.retiring = None;
            }
        }
    }

    /// Signs `message` against the current epoch. On
    /// [`SignError::BudgetExhausted`] with a ready successor, automatically
    /// cuts over and retries once against the new epoch rather than
    /// surfacing the exhaustion to the caller, using budget exhaustion as
    /// the signal to accelerate cutover.
    pub fn sign(&mut self, message: FieldElement, committee: &[NodeId], tick: u64) -> Result<PartialSignature, SignError> {
        match uss::partial_sign(message, committee, self.my_id, self.current.signing_share, &mut self.current.budget) {
            Ok(partial) => Ok(partial),
            Err(SignError::BudgetExhausted(exceeded)) => {
                if self.successor.is_some() {
                    let _ = self.cutover(tick);
                    uss::partial_sign(message, committee, self.my_id, self.current.signing_share, &mut self.current.budget)
                } else {
                    Err(SignError::BudgetExhausted(exceeded))
                }
            }
            Err(other) => Err(other),
        }
    }

    pub fn combine(&self, partials: &[PartialSignature], k: usize) -> Result<Signature, CombineError> {
        uss::combine(partials, k)
    }

    /// Verifies against the current epoch's verification shares; if that
    /// reports `insufficient_points` (e.g. right after cutover when this
    /// node's verification-share block is still the old one) and a retiring
    /// epoch is within its grace window, falls back to it.
    pub fn verify(&self, message: FieldElement, signature: Signature) -> VerifyOutcome {
        let outcome = uss::verify(message, signature, &self.current.verification_shares, self.current.degree);
        if !outcome.insufficient_points || self.retiring.is_none() {
            return outcome;
        }
        let (retiring, _) = self.retiring.as_ref().expect("checked is_none above");
        uss::verify(message, signature, &retiring.verification_shares, retiring.degree)
    }

    pub fn budget_remaining(&self) -> usize {
        self.current.budget.remaining()
    }

    pub fn excluded_contributors(&self) -> &[NodeId] {
        &self.current.excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uss::SignatureBudget as Budget;
    use liun_field::FieldElement as F;

    fn epoch(epoch_id: u64, degree: usize, signing_share: u64) -> Epoch {
        Epoch {
            epoch_id,
            degree,
            signing_share: F::new(signing_share),
            verification_shares: vec![],
            excluded: vec![],
            budget: Budget::new(degree),
        }
    }

    fn manager_with(current: Epoch, successor: Option<Epoch>) -> EpochManager {
        EpochManager {
            my_id: F::new(1),
            committee: vec![F::new(1), F::new(2), F::new(3)],
            config: EpochConfig::default(),
            current,
            successor,
            retiring: None,
        }
    }

    #[test]
    fn should_begin_overlap_once_watermark_crossed() {
        let mut current = epoch(1, 10, 42); // budget max = 5
        for i in 0..4u64 {
            current.budget.consume(F::new(100 + i)).unwrap();
        }
        let manager = manager_with(current, None);
        // 4/5 = 0.8, at the watermark.
        assert!(manager.should_begin_overlap());
    }

    #[test]
    fn should_not_begin_overlap_twice() {
        let current = epoch(1, 10, 42);
        let successor = epoch(2, 10, 99);
        let manager = manager_with(current, Some(successor));
        assert!(!manager.should_begin_overlap());
    }

    #[test]
    fn scenario_s6_cutover_switches_epoch_and_retains_old_for_grace() {
        let current = epoch(1, 10, 42);
        let successor = epoch(2, 10, 99);
        let mut manager = manager_with(current, Some(successor));

        let new_id = manager.cutover(100).unwrap();
        assert_eq!(new_id, 2);
        assert_eq!(manager.current_epoch_id(), 2);
        assert!(manager.retiring.is_some());

        manager.expire_grace(100); // before deadline (100 + grace_period_ticks)
        assert!(manager.retiring.is_some());
        manager.expire_grace(1000); // well past it
        assert!(manager.retiring.is_none());
    }

    #[test]
    fn cutover_without_successor_fails() {
        let current = epoch(1, 10, 42);
        let mut manager = manager_with(current, None);
        assert_eq!(manager.cutover(0), Err(NoSuccessorReady));
    }

    #[test]
    fn sign_auto_cuts_over_when_budget_exhausted_and_successor_ready() {
        let mut current = epoch(1, 4, 42); // budget max = 2
        current.budget.consume(F::new(1)).unwrap();
        current.budget.consume(F::new(2)).unwrap();
        let successor = epoch(2, 4, 99);
        let mut manager = manager_with(current, Some(successor));

        let committee = vec![F::new(1), F::new(2), F::new(3), F::new(4)];
        let partial = manager.sign(F::new(3), &committee, 0).unwrap();
        assert_eq!(manager.current_epoch_id(), 2);
        assert_eq!(partial.signer, F::new(1));
    }

    #[test]
    fn sign_surfaces_budget_exhausted_without_a_successor() {
        let mut current = epoch(1, 2, 42); // budget max = 1
        current.budget.consume(F::new(1)).unwrap();
        let mut manager = manager_with(current, None);
        let committee = vec![F::new(1), F::new(2), F::new(3)];
        let err = manager.sign(F::new(2), &committee, 0).unwrap_err();
        assert!(matches!(err, SignError::BudgetExhausted(_)));
    }
}
