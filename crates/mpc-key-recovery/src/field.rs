//! Arithmetic modulo a prime group order.
//!
//! Values are arbitrary-size unsigned integers; every operation reduces its result into
//! `[0, modulus)`. Inversion uses Fermat's little theorem, so the modulus must be prime.

use num_bigint::BigUint;
use num_traits::Zero as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeField {
    modulus: BigUint,
}

impl PrimeField {
    pub const fn new(modulus: BigUint) -> Self {
        Self { modulus }
    }

    pub const fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn reduce(&self, a: &BigUint) -> BigUint {
        a % &self.modulus
    }

    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.modulus
    }

    pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = self.reduce(a);
        let b = self.reduce(b);
        (a + &self.modulus - b) % &self.modulus
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    /// Multiplicative inverse, or `None` for values congruent to zero.
    pub fn inv(&self, a: &BigUint) -> Option<BigUint> {
        let a = self.reduce(a);
        if a.is_zero() {
            return None;
        }
        let exp = &self.modulus - BigUint::from(2_u8);
        Some(a.modpow(&exp, &self.modulus))
    }

    /// Lagrange basis coefficient at zero for the participant at `index`:
    /// `prod_{j != index} id_j * (id_j - id_index)^-1`.
    ///
    /// Returns `None` when two participants share an id (the denominator vanishes)
    /// or `index` is out of range.
    pub fn lagrange_coefficient(&self, ids: &[BigUint], index: usize) -> Option<BigUint> {
        let own = ids.get(index)?;
        let mut coeff = BigUint::from(1_u8);
        for (j, other) in ids.iter().enumerate() {
            if j == index {
                continue;
            }
            let denom = self.inv(&self.sub(other, own))?;
            coeff = self.mul(&self.mul(&coeff, other), &denom);
        }
        Some(coeff)
    }

    /// `sum_i v_i * L_i` over all participants.
    pub fn interpolate_at_zero(&self, ids: &[BigUint], values: &[BigUint]) -> Option<BigUint> {
        if ids.len() != values.len() {
            return None;
        }
        let mut acc = BigUint::ZERO;
        for (i, v) in values.iter().enumerate() {
            let l = self.lagrange_coefficient(ids, i)?;
            acc = self.add(&acc, &self.mul(v, &l));
        }
        Some(acc)
    }

    pub fn sum<'a>(&self, values: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
        values
            .into_iter()
            .fold(BigUint::ZERO, |acc, v| self.add(&acc, v))
    }
}
