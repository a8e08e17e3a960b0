//! Curve engines: group order and base-point multiplication for the two supported curves.

use curve25519_dalek::{edwards::CompressedEdwardsY, EdwardsPoint, Scalar};
use k256::elliptic_curve::sec1::ToEncodedPoint as _;
use num_bigint::BigUint;
use num_traits::Zero as _;

use crate::field::PrimeField;

const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

// l = 2^252 + 27742317777372353535851937790883648493
const ED25519_ORDER: [u8; 32] = [
    0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x14, 0xde, 0xf9, 0xde, 0xa2, 0xf7, 0x9c, 0xd6, 0x58, 0x12, 0x63, 0x1a, 0x5c, 0xf5, 0xd3, 0xed,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256k1,
    Ed25519,
}

impl Curve {
    pub fn order(self) -> BigUint {
        match self {
            Self::Secp256k1 => BigUint::from_bytes_be(&SECP256K1_ORDER),
            Self::Ed25519 => BigUint::from_bytes_be(&ED25519_ORDER),
        }
    }

    pub fn field(self) -> PrimeField {
        PrimeField::new(self.order())
    }

    /// `scalar * G`, serialized canonically for the curve:
    /// secp256k1 as 33-byte compressed SEC1, ed25519 as the 32-byte compressed Edwards-y encoding.
    ///
    /// Returns `None` for a zero scalar or one outside `[1, order)`.
    pub fn public_key(self, scalar: &BigUint) -> Option<Vec<u8>> {
        if scalar.is_zero() || *scalar >= self.order() {
            return None;
        }
        let be = scalar_to_be32(scalar)?;
        match self {
            Self::Secp256k1 => {
                let sk = k256::SecretKey::from_slice(&be).ok()?;
                Some(sk.public_key().to_encoded_point(true).as_bytes().to_vec())
            }
            Self::Ed25519 => {
                let s = ed25519_scalar(&be);
                Some(EdwardsPoint::mul_base(&s).compress().to_bytes().to_vec())
            }
        }
    }
}

/// Left-pads a scalar to 32 big-endian bytes. `None` if it does not fit.
pub fn scalar_to_be32(v: &BigUint) -> Option<[u8; 32]> {
    let bytes = v.to_bytes_be();
    if bytes.len() > 32 {
        return None;
    }
    let mut out = [0_u8; 32];
    let start = 32 - bytes.len();
    out.get_mut(start..)?.copy_from_slice(&bytes);
    Some(out)
}

/// Interprets 32 big-endian bytes as an ed25519 scalar, reduced mod l.
pub fn ed25519_scalar(be: &[u8; 32]) -> Scalar {
    let mut le = *be;
    le.reverse();
    Scalar::from_bytes_mod_order(le)
}

/// `point + t * B` on ed25519, over compressed encodings.
pub fn ed25519_add_base_multiple(point: &[u8; 32], t_be: &[u8; 32]) -> Option<[u8; 32]> {
    let p = CompressedEdwardsY(*point).decompress()?;
    let sum = p + EdwardsPoint::mul_base(&ed25519_scalar(t_be));
    Some(sum.compress().to_bytes())
}
