//! Unconditionally-secure threshold signatures.
//!
//! The committee's secret is a degree-`d` polynomial `F` over GF(M61); each
//! signer holds exactly one point `F(id)` (the [`liun_dkg::DkgOutput`]
//! `signing_share`), and a verifier holds a disjoint set of `F`'s evaluations
//! at other public arguments (`verification_shares`) handed out during DKG.
//!
//! A signature of message `m` (itself a field element) is `sigma = F(m)`. A
//! committee of `k` signers computes it without ever reconstructing `F`
//! itself: each contributes `partial_j = s_j · L_j(m)` (its share times its
//! Lagrange basis coefficient for `m`), and `combine` sums these — the
//! Lagrange identity guarantees the sum is exactly `F(m)` when the committee
//! has size `k` and every partial is honest.
//!
//! Every signed message permanently reveals one new public evaluation of
//! `F`. [`SignatureBudget`] caps the number of *distinct* messages signed per
//! epoch at `d / 2`, staying well clear of the `d + 1` points needed to
//! reconstruct `F` outright.

use liun_field::{lagrange_interpolate_at, FieldElement, Point};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::channel::NodeId;

/// One signer's contribution toward a combined signature of `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSignature {
    pub signer: NodeId,
    pub value: FieldElement,
}

/// `sigma = F(message)`, the combined unconditionally-secure signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub FieldElement);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signer {signer:?} is not a member of the declared committee")]
    InvalidCommittee { signer: NodeId },
    #[error(transparent)]
    BudgetExhausted(#[from] BudgetExceeded),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombineError {
    #[error("combining needs at least {k} partial signatures, got {got}")]
    InsufficientShares { k: usize, got: usize },
    #[error("duplicate signer {0:?} among supplied partial signatures")]
    DuplicateSigner(NodeId),
}

/// Computes the Lagrange basis coefficient `L_signer(m) = Π_{i≠signer} (m−i)/(signer−i)`
/// for `signer` within `committee`, i.e. the weight such that
/// `Σ L_i(m) · F(i) == F(m)`.
fn lagrange_basis_coefficient(committee: &[NodeId], signer: NodeId, m: FieldElement) -> FieldElement {
    let mut numerator = FieldElement::ONE;
    let mut denominator = FieldElement::ONE;
    for &other in committee {
        if other == signer {
            continue;
        }
        numerator = numerator.mul(m.sub(other));
        denominator = denominator.mul(signer.sub(other));
    }
    numerator
        .div(denominator)
        .expect("committee members are pairwise distinct by construction")
}

/// Computes this signer's contribution to the combined signature of
/// `message`, relative to the full cooperating `committee` (which must
/// include `my_id`). Consumes one unit of `budget` unless `message` was
/// already signed this epoch.
pub fn partial_sign(
    message: FieldElement,
    committee: &[NodeId],
    my_id: NodeId,
    signing_share: FieldElement,
    budget: &mut SignatureBudget,
) -> Result<PartialSignature, SignError> {
    if !committee.contains(&my_id) {
        return Err(SignError::InvalidCommittee { signer: my_id });
    }
    budget.consume(message)?;
    let lambda = lagrange_basis_coefficient(committee, my_id, message);
    Ok(PartialSignature {
        signer: my_id,
        value: signing_share.mul(lambda),
    })
}

/// Combines `k` or more partial signatures of the same message into the
/// final signature. `sigma == F(message)` exactly when the partials are
/// honest and the committee has at least `k` members (the Lagrange
/// identity, no rounding).
pub fn combine(partials: &[PartialSignature], k: usize) -> Result<Signature, CombineError> {
    if partials.len() < k {
        return Err(CombineError::InsufficientShares {
            k,
            got: partials.len(),
        });
    }
    let mut seen = HashSet::with_capacity(partials.len());
    for p in partials {
        if !seen.insert(p.signer.value()) {
            return Err(CombineError::DuplicateSigner(p.signer));
        }
    }
    let sum = partials.iter().fold(FieldElement::ZERO, |acc, p| acc.add(p.value));
    Ok(Signature(sum))
}

/// Verification result: distinguishes a genuine failure from "this verifier
/// doesn't hold enough verification shares to judge at all", so callers
/// never treat a vacuous pass as a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub insufficient_points: bool,
}

/// Checks `signature` against `message` using only the verifier's own
/// `verification_shares` — points of `F` disjoint from any signer's share,
/// established once during DKG. No cooperation with the signers is needed.
///
/// Requires `|verification_shares| > degree`; with fewer, `valid` is `false`
/// and `insufficient_points` is set (never a false accept). Otherwise,
/// interpolates the degree-`d` polynomial through the first `d + 1` points
/// and checks both `(message, signature)` and every remaining point for
/// exact equality — the latter catching a corrupted local verification set
/// rather than anything about the signature itself.
pub fn verify(message: FieldElement, signature: Signature, verification_shares: &[(FieldElement, FieldElement)], degree: usize) -> VerifyOutcome {
    if verification_shares.len() <= degree {
        return VerifyOutcome {
            valid: false,
            insufficient_points: true,
        };
    }
    let basis: Vec<Point> = verification_shares[..degree + 1]
        .iter()
        .map(|&(x, y)| Point::new(x, y))
        .collect();
    let remaining = &verification_shares[degree + 1..];

    let expected = lagrange_interpolate_at(&basis, message).expect("verification shares have distinct arguments");
    if expected != signature.0 {
        return VerifyOutcome {
            valid: false,
            insufficient_points: false,
        };
    }
    let self_consistent = remaining
        .iter()
        .all(|&(x, y)| lagrange_interpolate_at(&basis, x).map(|v| v == y).unwrap_or(false));
    VerifyOutcome {
        valid: self_consistent,
        insufficient_points: false,
    }
}

/// The outcome of [`resolve_dispute`]: a signature is forged iff the
/// trust-weighted rejections meet or exceed the trust-weighted acceptances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeVerdict {
    Valid,
    Forged,
}

/// Resolves a disputed signature by trust-weighted vote among verifier
/// reports. Each report is `(verifier_id, accepted)`; verifiers absent from
/// `trust` contribute zero weight.
pub fn resolve_dispute(reports: &[(NodeId, bool)], trust: &HashMap<NodeId, f64>) -> DisputeVerdict {
    let mut weighted_accept = 0.0;
    let mut weighted_reject = 0.0;
    for &(verifier, accepted) in reports {
        let weight = trust.get(&verifier).copied().unwrap_or(0.0);
        if accepted {
            weighted_accept += weight;
        } else {
            weighted_reject += weight;
        }
    }
    if weighted_reject >= weighted_accept {
        DisputeVerdict::Forged
    } else {
        DisputeVerdict::Valid
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("signature budget exhausted: {used}/{max} distinct messages signed this epoch")]
pub struct BudgetExceeded {
    pub used: usize,
    pub max: usize,
}

/// Tracks how many distinct messages a committee has signed this epoch,
/// capping at `degree / 2`: each newly signed message reveals one new public
/// point of `F`, and re-signing an already-signed message is free since it
/// reveals nothing new.
pub struct SignatureBudget {
    max: usize,
    signed: HashSet<u64>,
}

impl SignatureBudget {
    pub fn new(degree: usize) -> Self {
        SignatureBudget {
            max: degree / 2,
            signed: HashSet::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.signed.len())
    }

    pub fn used(&self) -> usize {
        self.signed.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Records an intent to sign `message`, enforcing the budget.
    pub fn consume(&mut self, message: FieldElement) -> Result<(), BudgetExceeded> {
        let key = message.value();
        if self.signed.contains(&key) {
            return Ok(());
        }
        if self.signed.len() >= self.max {
            return Err(BudgetExceeded {
                used: self.signed.len(),
                max: self.max,
            });
        }
        self.signed.insert(key);
        Ok(())
    }
}
