use crate::{FieldElement, Point};
use rand_core::{CryptoRng, RngCore};

/// An immutable polynomial over GF(M61), coefficients ordered low-to-high
/// (`a0 + a1*x + ... + ad*x^d`).
///
/// The leading coefficient is nonzero unless the polynomial is identically
/// zero (the single-coefficient `[0]` polynomial is the canonical zero).
///
/// Coefficients are secret material when this polynomial is a Shamir/DKG
/// contribution, so they're zeroized on drop.
#[derive(Debug, Clone, PartialEq, Eq, zeroize::Zeroize)]
#[zeroize(drop)]
pub struct Polynomial {
    coeffs: Vec<FieldElement>,
}

impl Polynomial {
    /// Builds a polynomial from coefficients, trimming trailing zero
    /// coefficients so the leading one is nonzero (or the polynomial is the
    /// canonical zero, `[0]`).
    pub fn new(mut coeffs: Vec<FieldElement>) -> Self {
        while coeffs.len() > 1 && *coeffs.last().unwrap() == FieldElement::ZERO {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(FieldElement::ZERO);
        }
        Polynomial { coeffs }
    }

    /// Samples a random degree-`d` polynomial with the given constant term
    /// (`a0 = constant_term`) and uniform higher coefficients. Used by Shamir
    /// splitting and DKG contribution, where `constant_term` is the secret.
    pub fn random_with_constant_term<R: RngCore + CryptoRng>(
        rng: &mut R,
        degree: usize,
        constant_term: FieldElement,
    ) -> Self {
        let mut coeffs = Vec::with_capacity(degree + 1);
        coeffs.push(constant_term);
        for _ in 0..degree {
            coeffs.push(FieldElement::random(rng));
        }
        // Do not trim here: a caller-specified degree is a commitment, even if
        // the sampled leading coefficient happens to be zero with negligible
        // probability (1/M61).
        Polynomial { coeffs }
    }

    /// The polynomial's degree (`coeffs.len() - 1`).
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// The coefficients, low-to-high.
    pub fn coeffs(&self) -> &[FieldElement] {
        &self.coeffs
    }

    /// Evaluates the polynomial at `x` via Horner's method.
    pub fn eval(&self, x: FieldElement) -> FieldElement {
        FieldElement::poly_eval(&self.coeffs, x)
    }

    /// Evaluates the polynomial at each of `xs`, returning the resulting points.
    pub fn eval_many(&self, xs: &[FieldElement]) -> Vec<Point> {
        xs.iter().map(|&x| Point::new(x, self.eval(x))).collect()
    }

    /// The constant term `a0`, i.e. `self.eval(0)`.
    pub fn constant_term(&self) -> FieldElement {
        self.coeffs[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn trims_trailing_zero_coefficients() {
        let p = Polynomial::new(vec![
            FieldElement::new(5),
            FieldElement::ZERO,
            FieldElement::ZERO,
        ]);
        assert_eq!(p.degree(), 0);
        assert_eq!(p.coeffs(), &[FieldElement::new(5)]);
    }

    #[test]
    fn zero_polynomial_is_canonical() {
        let p = Polynomial::new(vec![]);
        assert_eq!(p.coeffs(), &[FieldElement::ZERO]);
    }

    #[test]
    fn random_with_constant_term_preserves_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let secret = FieldElement::new(12345);
        let p = Polynomial::random_with_constant_term(&mut rng, 4, secret);
        assert_eq!(p.degree(), 4);
        assert_eq!(p.constant_term(), secret);
        assert_eq!(p.eval(FieldElement::ZERO), secret);
    }
}
