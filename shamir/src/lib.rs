//! Shamir `(k, n)` threshold secret sharing over GF(M61), with
//! consistent-majority corrupt-share detection.

use liun_field::{lagrange_interpolate_at, FieldElement, Point, Polynomial};
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

/// A single Shamir share `(x, y)` with `x != 0` and `y = f(x)` for the
/// underlying polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShamirShare {
    pub x: FieldElement,
    pub y: FieldElement,
}

impl ShamirShare {
    fn point(self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Error returned by [`split`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidParams {
    /// `k < 1`: a threshold of zero shares cannot reconstruct anything.
    #[error("threshold k must be at least 1, got {0}")]
    ThresholdTooSmall(usize),
    /// `n < k`: fewer shares than the threshold can never be reconstructed.
    #[error("share count n ({n}) must be at least threshold k ({k})")]
    NotEnoughShares { n: usize, k: usize },
    /// `n` does not fit the `x = 1..=n` coordinate scheme used by this
    /// implementation (coordinates must stay nonzero and distinct).
    #[error("share count n ({0}) does not fit in a u64 x-coordinate")]
    TooManyShares(usize),
}

/// Error returned by [`reconstruct_at`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructError {
    /// Caller supplied a threshold and fewer than that many shares.
    #[error("reconstruction needs at least {k} shares, got {got}")]
    InsufficientShares { k: usize, got: usize },
    /// Two supplied shares had the same x-coordinate.
    #[error("duplicate x-coordinate {0} among supplied shares")]
    DuplicateXCoordinate(u64),
    /// No shares were supplied at all.
    #[error("no shares supplied")]
    NoShares,
}

/// Splits `secret` into `n` shares such that any `k` of them reconstruct it
/// and any `k - 1` reveal no information about it (information-theoretic
/// privacy).
///
/// Samples `k - 1` independent uniform coefficients, fixes `a0 = secret`, and
/// evaluates at `x = 1, 2, ..., n`.
pub fn split<R: RngCore + CryptoRng>(
    rng: &mut R,
    secret: FieldElement,
    k: usize,
    n: usize,
) -> Result<Vec<ShamirShare>, InvalidParams> {
    if k < 1 {
        return Err(InvalidParams::ThresholdTooSmall(k));
    }
    if n < k {
        return Err(InvalidParams::NotEnoughShares { n, k });
    }
    let n_u64 = u64::try_from(n).map_err(|_| InvalidParams::TooManyShares(n))?;

    let poly = Polynomial::random_with_constant_term(rng, k - 1, secret);
    let shares = (1..=n_u64)
        .map(|xi| {
            let x = FieldElement::new(xi);
            ShamirShare {
                x,
                y: poly.eval(x),
            }
        })
        .collect();
    Ok(shares)
}

/// Interpolates the shares at `x`, i.e. `reconstruct_at(shares, 0)` recovers
/// the original secret. No threshold is enforced here beyond "at least one
/// share" and "distinct x-coordinates" — callers that want a `k`-floor should
/// use [`reconstruct_with_threshold`].
pub fn reconstruct_at(shares: &[ShamirShare], x: FieldElement) -> Result<FieldElement, ReconstructError> {
    if shares.is_empty() {
        return Err(ReconstructError::NoShares);
    }
    let points: Vec<Point> = shares.iter().map(|s| s.point()).collect();
    lagrange_interpolate_at(&points, x).map_err(|e| match e {
        liun_field::InvalidInput::DuplicateXCoordinate(xc) => ReconstructError::DuplicateXCoordinate(xc),
        liun_field::InvalidInput::NoPoints => ReconstructError::NoShares,
    })
}

/// As [`reconstruct_at`], but fails with [`ReconstructError::InsufficientShares`]
/// if fewer than `k` shares are supplied.
pub fn reconstruct_with_threshold(
    shares: &[ShamirShare],
    k: usize,
    x: FieldElement,
) -> Result<FieldElement, ReconstructError> {
    if shares.len() < k {
        return Err(ReconstructError::InsufficientShares {
            k,
            got: shares.len(),
        });
    }
    reconstruct_at(shares, x)
}

/// Consistent-majority corrupt-share detection.
///
/// Any `k` shares determine a degree-`(k - 1)` polynomial, so a single `k`-sized
/// basis trivially "agrees with itself" regardless of whether it was drawn from
/// honest or corrupt shares — picking a fixed basis (e.g. the first `k` of some
/// arbitrary order) and judging everyone else against it risks building that
/// basis out of corrupt shares and falsely condemning the honest majority.
/// Instead, this searches every `k`-sized basis among `shares`, interpolates
/// the curve it implies, and counts how many of *all* the shares land on that
/// curve. The basis (or tied bases, which necessarily agree on classification
/// once real corroboration exists — see below) with the most agreement beyond
/// the trivial `k` defines the honest curve; shares on it are `good`, the rest
/// are `bad`.
///
/// A minimum of `k + 1` shares is required to detect any corruption at all;
/// with `2k` shares, up to `k - 1` corruptions are reliably detected. Below
/// that redundancy — or when no basis attracts more than the trivial `k`
/// agreements, i.e. no consistent majority can be corroborated — this reports
/// no shares as good rather than risk certifying a corrupt-majority curve.
pub fn consistency_check(shares: &[ShamirShare], k: usize) -> (Vec<ShamirShare>, Vec<ShamirShare>) {
    let n = shares.len();

    if k == 0 || n < k + 1 {
        // Not enough redundancy to certify anything either way.
        return (shares.to_vec(), Vec::new());
    }

    let points: Vec<Point> = shares.iter().map(|s| s.point()).collect();

    // Baseline: any basis agrees with its own k members trivially, so only a
    // strictly larger agreement count counts as real corroboration.
    let mut best_count = k;
    let mut best_agree: Option<Vec<bool>> = None;

    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        let basis: Vec<Point> = indices.iter().map(|&i| points[i]).collect();
        let mut agree = vec![false; n];
        let mut count = 0usize;
        let mut basis_valid = true;
        for (i, p) in points.iter().enumerate() {
            match lagrange_interpolate_at(&basis, p.x) {
                Ok(v) => {
                    if v == p.y {
                        agree[i] = true;
                        count += 1;
                    }
                }
                Err(_) => {
                    // Duplicate x-coordinate inside the basis; skip it.
                    basis_valid = false;
                    break;
                }
            }
        }
        if basis_valid && count > best_count {
            best_count = count;
            best_agree = Some(agree);
        }

        if !next_combination(&mut indices, n) {
            break;
        }
    }

    let mut good = Vec::new();
    let mut bad = Vec::new();
    match best_agree {
        Some(agree) => {
            for (i, s) in shares.iter().enumerate() {
                if agree[i] {
                    good.push(*s);
                } else {
                    bad.push(*s);
                }
            }
        }
        None => {
            // No basis found corroboration beyond its own members: the
            // available redundancy can't single out a trustworthy curve, so
            // nothing is certified good.
            bad.extend_from_slice(shares);
        }
    }

    (good, bad)
}

/// Advances `indices` (currently some size-`k` combination of `0..n`, `k =
/// indices.len()`) to the next combination in lexicographic order. Returns
/// `false` once the last combination has been reached.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    if k == 0 {
        return false;
    }
    let mut i = k;
    while i > 0 {
        i -= 1;
        if indices[i] < n - k + i {
            indices[i] += 1;
            for j in (i + 1)..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use liun_field::FieldElement;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(99)
    }

    #[test]
    fn scenario_s1_split_and_reconstruct_roundtrip() {
        let mut r = rng();
        let secret = FieldElement::new(12345);
        let shares = split(&mut r, secret, 3, 5).unwrap();
        assert_eq!(shares.len(), 5);

        let subset = [shares[0], shares[2], shares[4]];
        let recovered = reconstruct_at(&subset, FieldElement::ZERO).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn scenario_s2_corrupt_share_detection() {
        let mut r = rng();
        let secret = FieldElement::new(12345);
        let mut shares = split(&mut r, secret, 3, 5).unwrap();
        shares[2].y = shares[2].y.add(FieldElement::new(7));

        let (good, bad) = consistency_check(&shares, 3);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].x, shares[2].x);
        assert_eq!(good.len(), 4);
    }

    #[test]
    fn k_equals_1_shares_equal_the_secret() {
        let mut r = rng();
        let secret = FieldElement::new(777);
        let shares = split(&mut r, secret, 1, 4).unwrap();
        for s in &shares {
            assert_eq!(s.y, secret);
        }
    }

    #[test]
    fn k_equals_n_requires_all_shares() {
        let mut r = rng();
        let secret = FieldElement::new(42);
        let shares = split(&mut r, secret, 4, 4).unwrap();
        let recovered = reconstruct_at(&shares, FieldElement::ZERO).unwrap();
        assert_eq!(recovered, secret);

        // n - 1 shares interpolated at 0 do not reveal the secret in general
        // (this is a sanity smoke test, not a statistical privacy proof).
        let partial = &shares[..3];
        let guess = reconstruct_at(partial, FieldElement::ZERO).unwrap();
        assert_ne!(guess, secret);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let mut r = rng();
        assert_eq!(
            split(&mut r, FieldElement::ZERO, 0, 5),
            Err(InvalidParams::ThresholdTooSmall(0))
        );
        assert_eq!(
            split(&mut r, FieldElement::ZERO, 5, 3),
            Err(InvalidParams::NotEnoughShares { n: 3, k: 5 })
        );
    }

    #[test]
    fn reconstruct_with_threshold_enforces_floor() {
        let mut r = rng();
        let shares = split(&mut r, FieldElement::new(1), 3, 5).unwrap();
        let err = reconstruct_with_threshold(&shares[..2], 3, FieldElement::ZERO).unwrap_err();
        assert_eq!(err, ReconstructError::InsufficientShares { k: 3, got: 2 });
    }

    #[test]
    fn consistency_check_below_redundancy_floor_never_falsely_accuses() {
        // k+1 = 4 shares is the bare minimum; fewer than that must not blame.
        let mut r = rng();
        let mut shares = split(&mut r, FieldElement::new(9), 3, 3).unwrap();
        shares[0].y = shares[0].y.add(FieldElement::new(1));
        let (_, bad) = consistency_check(&shares, 3);
        assert!(bad.is_empty());
    }
}
