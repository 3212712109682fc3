//! Prime-field arithmetic over GF(M61), M61 = 2^61 - 1.
//!
//! All elements are integers in `[0, M61)`. Multiplication goes through a `u128`
//! intermediate so two 61-bit operands never overflow; reduction uses the fast
//! Mersenne trick `(x & M61) + (x >> 61)` followed by a single conditional
//! subtract, rather than a generic modulo.

use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

mod poly;

pub use poly::Polynomial;

/// The field modulus: the Mersenne prime 2^61 - 1.
pub const M61: u64 = (1u64 << 61) - 1;

/// Error returned by field operations whose domain excludes the given input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    /// `inv(0)` was requested; zero has no multiplicative inverse.
    #[error("zero has no multiplicative inverse in GF(M61)")]
    InverseOfZero,
}

/// Error returned when interpolation input is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    /// Two supplied interpolation points shared the same x-coordinate.
    #[error("duplicate x-coordinate in interpolation input: {0}")]
    DuplicateXCoordinate(u64),
    /// Interpolation was called with no points at all.
    #[error("interpolation requires at least one point")]
    NoPoints,
}

/// An element of GF(M61), always held in reduced form `< M61`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, zeroize::Zeroize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldElement(u64);

impl FieldElement {
    /// The additive identity.
    pub const ZERO: FieldElement = FieldElement(0);
    /// The multiplicative identity.
    pub const ONE: FieldElement = FieldElement(1);

    /// Builds a field element from an arbitrary `u64`, reducing it into `[0, M61)`.
    ///
    /// `u64::MAX < 2 * M61`, so a single conditional subtract after the
    /// Mersenne fold suffices.
    pub const fn new(value: u64) -> Self {
        let folded = (value & M61) + (value >> 61);
        FieldElement(if folded >= M61 { folded - M61 } else { folded })
    }

    /// Returns the raw value in `[0, M61)`.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Samples a uniform element of GF(M61) from a cryptographically secure RNG.
    ///
    /// Uses rejection sampling against `u64` draws so the distribution is exactly
    /// uniform (not merely approximately so via a plain modulo).
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        // Largest multiple of M61 that fits in u64, to reject the biased tail.
        let limit = u64::MAX - (u64::MAX % M61);
        loop {
            let candidate = rng.next_u64();
            if candidate < limit {
                return FieldElement(candidate % M61);
            }
        }
    }

    /// `self + other mod M61`.
    pub fn add(self, other: Self) -> Self {
        let sum = self.0 + other.0;
        FieldElement(if sum >= M61 { sum - M61 } else { sum })
    }

    /// `self - other mod M61`.
    pub fn sub(self, other: Self) -> Self {
        self.add(other.neg())
    }

    /// `-self mod M61`.
    pub fn neg(self) -> Self {
        if self.0 == 0 {
            FieldElement(0)
        } else {
            FieldElement(M61 - self.0)
        }
    }

    /// `self * other mod M61`, via a 128-bit intermediate product and Mersenne
    /// reduction.
    pub fn mul(self, other: Self) -> Self {
        let product = u128::from(self.0) * u128::from(other.0);
        reduce_u128(product)
    }

    /// `self^exponent mod M61` by square-and-multiply.
    pub fn pow(self, mut exponent: u64) -> Self {
        let mut base = self;
        let mut result = FieldElement::ONE;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.mul(base);
            }
            base = base.mul(base);
            exponent >>= 1;
        }
        result
    }

    /// The multiplicative inverse, via Fermat's little theorem (`a^(p-2)`).
    ///
    /// Fails with [`DomainError::InverseOfZero`] for `self == 0`.
    pub fn inv(self) -> Result<Self, DomainError> {
        if self.0 == 0 {
            return Err(DomainError::InverseOfZero);
        }
        Ok(self.pow(M61 - 2))
    }

    /// `self / other mod M61`. Fails iff `other == 0`.
    pub fn div(self, other: Self) -> Result<Self, DomainError> {
        Ok(self.mul(other.inv()?))
    }

    /// Evaluates a polynomial at this point, coefficients ordered low-to-high
    /// (`a0 + a1*x + a2*x^2 + ...`), via Horner's method.
    pub fn poly_eval(coeffs: &[FieldElement], x: FieldElement) -> FieldElement {
        coeffs
            .iter()
            .rev()
            .fold(FieldElement::ZERO, |acc, &c| acc.mul(x).add(c))
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        FieldElement::new(value)
    }
}

impl std::ops::Add for FieldElement {
    type Output = FieldElement;
    fn add(self, rhs: Self) -> Self::Output {
        FieldElement::add(self, rhs)
    }
}
impl std::ops::Sub for FieldElement {
    type Output = FieldElement;
    fn sub(self, rhs: Self) -> Self::Output {
        FieldElement::sub(self, rhs)
    }
}
impl std::ops::Mul for FieldElement {
    type Output = FieldElement;
    fn mul(self, rhs: Self) -> Self::Output {
        FieldElement::mul(self, rhs)
    }
}
impl std::ops::Neg for FieldElement {
    type Output = FieldElement;
    fn neg(self) -> Self::Output {
        FieldElement::neg(self)
    }
}
impl std::iter::Sum for FieldElement {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(FieldElement::ZERO, FieldElement::add)
    }
}

fn reduce_u128(x: u128) -> FieldElement {
    let m61 = u128::from(M61);
    let folded = (x & m61) + (x >> 61);
    // One fold can still exceed M61 (though never by more than a small factor
    // for 61-bit operand products), so reduce again before the final compare.
    let folded = (folded & m61) + (folded >> 61);
    let folded = folded as u64;
    FieldElement(if folded >= M61 { folded - M61 } else { folded })
}

/// A single Shamir-style evaluation point `(x, f(x))` used by interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
}

impl Point {
    pub fn new(x: FieldElement, y: FieldElement) -> Self {
        Point { x, y }
    }
}

/// Evaluates the unique degree-`(points.len() - 1)` polynomial through `points`
/// at `x`, via Lagrange interpolation. Exact: no rounding, no approximation.
///
/// With one point, returns its constant value. Fails with
/// [`InvalidInput::DuplicateXCoordinate`] if any two points share an x-coordinate,
/// and with [`InvalidInput::NoPoints`] if `points` is empty.
pub fn lagrange_interpolate_at(points: &[Point], x: FieldElement) -> Result<FieldElement, InvalidInput> {
    if points.is_empty() {
        return Err(InvalidInput::NoPoints);
    }
    check_distinct_x(points)?;

    let mut total = FieldElement::ZERO;
    for (i, pi) in points.iter().enumerate() {
        let mut numerator = FieldElement::ONE;
        let mut denominator = FieldElement::ONE;
        for (j, pj) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = numerator.mul(x.sub(pj.x));
            denominator = denominator.mul(pi.x.sub(pj.x));
        }
        // denominator is nonzero because x-coordinates are distinct.
        let basis = numerator
            .div(denominator)
            .expect("distinct x-coordinates guarantee a nonzero denominator");
        total = total.add(pi.y.mul(basis));
    }
    Ok(total)
}

/// Builds the Newton (divided-difference) form of the polynomial through
/// `points`: returns `(xs, divided_differences)` such that the polynomial value
/// at `x` is `dd[0] + dd[1]*(x - xs[0]) + dd[2]*(x - xs[0])*(x - xs[1]) + ...`.
pub fn newton_divided_differences(points: &[Point]) -> Result<(Vec<FieldElement>, Vec<FieldElement>), InvalidInput> {
    if points.is_empty() {
        return Err(InvalidInput::NoPoints);
    }
    check_distinct_x(points)?;

    let xs: Vec<FieldElement> = points.iter().map(|p| p.x).collect();
    let mut table: Vec<FieldElement> = points.iter().map(|p| p.y).collect();
    let mut dd = Vec::with_capacity(points.len());
    dd.push(table[0]);
    for level in 1..points.len() {
        for i in (level..points.len()).rev() {
            let denom = xs[i].sub(xs[i - level]);
            table[i] = table[i]
                .sub(table[i - 1])
                .div(denom)
                .expect("distinct x-coordinates guarantee a nonzero denominator");
        }
        dd.push(table[level]);
    }
    Ok((xs, dd))
}

/// Evaluates a polynomial given in Newton (divided-difference) form at `x`.
pub fn newton_eval(xs: &[FieldElement], dd: &[FieldElement], x: FieldElement) -> FieldElement {
    let mut result = *dd.last().unwrap_or(&FieldElement::ZERO);
    for k in (0..dd.len().saturating_sub(1)).rev() {
        result = result.mul(x.sub(xs[k])).add(dd[k]);
    }
    result
}

fn check_distinct_x(points: &[Point]) -> Result<(), InvalidInput> {
    let mut seen: Vec<FieldElement> = Vec::with_capacity(points.len());
    for p in points {
        if seen.contains(&p.x) {
            return Err(InvalidInput::DuplicateXCoordinate(p.x.value()));
        }
        seen.push(p.x);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    #[test]
    fn add_is_commutative_and_reduced() {
        let mut r = rng();
        for _ in 0..200 {
            let a = FieldElement::random(&mut r);
            let b = FieldElement::random(&mut r);
            assert_eq!(a.add(b), b.add(a));
            assert!(a.add(b).value() < M61);
        }
    }

    #[test]
    fn mul_stays_in_field_and_no_overflow() {
        let a = FieldElement::new(M61 - 1);
        let b = FieldElement::new(M61 - 1);
        let c = a.mul(b);
        assert!(c.value() < M61);
        // (p-1)*(p-1) mod p == 1
        assert_eq!(c, FieldElement::ONE);
    }

    #[test]
    fn inverse_round_trips_for_all_nonzero() {
        let mut r = rng();
        for _ in 0..200 {
            let a = FieldElement::random(&mut r);
            if a == FieldElement::ZERO {
                continue;
            }
            let inv = a.inv().unwrap();
            assert_eq!(a.mul(inv), FieldElement::ONE);
        }
    }

    #[test]
    fn inverse_of_zero_fails() {
        assert_eq!(FieldElement::ZERO.inv(), Err(DomainError::InverseOfZero));
    }

    #[test]
    fn poly_eval_matches_direct_evaluation() {
        // f(x) = 3 + 2x + 5x^2
        let coeffs = [
            FieldElement::new(3),
            FieldElement::new(2),
            FieldElement::new(5),
        ];
        let x = FieldElement::new(7);
        let expected = FieldElement::new(3)
            .add(FieldElement::new(2).mul(x))
            .add(FieldElement::new(5).mul(x).mul(x));
        assert_eq!(FieldElement::poly_eval(&coeffs, x), expected);
    }

    #[test]
    fn lagrange_recovers_known_polynomial_exactly() {
        // f(x) = 3 + 2x + 5x^2, sample 3 points (degree 2 needs 3 points)
        let coeffs = [
            FieldElement::new(3),
            FieldElement::new(2),
            FieldElement::new(5),
        ];
        let points: Vec<Point> = (1..=3u64)
            .map(|xi| {
                let x = FieldElement::new(xi);
                Point::new(x, FieldElement::poly_eval(&coeffs, x))
            })
            .collect();
        for target in 0..10u64 {
            let x = FieldElement::new(target);
            let expected = FieldElement::poly_eval(&coeffs, x);
            assert_eq!(lagrange_interpolate_at(&points, x).unwrap(), expected);
        }
    }

    #[test]
    fn lagrange_single_point_is_constant() {
        let points = [Point::new(FieldElement::new(5), FieldElement::new(99))];
        for target in 0..5u64 {
            assert_eq!(
                lagrange_interpolate_at(&points, FieldElement::new(target)).unwrap(),
                FieldElement::new(99)
            );
        }
    }

    #[test]
    fn lagrange_rejects_duplicate_x() {
        let points = [
            Point::new(FieldElement::new(1), FieldElement::new(1)),
            Point::new(FieldElement::new(1), FieldElement::new(2)),
        ];
        assert!(matches!(
            lagrange_interpolate_at(&points, FieldElement::new(0)),
            Err(InvalidInput::DuplicateXCoordinate(1))
        ));
    }

    #[test]
    fn newton_form_matches_lagrange() {
        let coeffs = [FieldElement::new(11), FieldElement::new(4), FieldElement::new(9)];
        let points: Vec<Point> = (1..=3u64)
            .map(|xi| {
                let x = FieldElement::new(xi);
                Point::new(x, FieldElement::poly_eval(&coeffs, x))
            })
            .collect();
        let (xs, dd) = newton_divided_differences(&points).unwrap();
        for target in 0..8u64 {
            let x = FieldElement::new(target);
            assert_eq!(
                newton_eval(&xs, &dd, x),
                lagrange_interpolate_at(&points, x).unwrap()
            );
        }
    }
}
