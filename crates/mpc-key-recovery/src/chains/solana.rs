//! ed25519 child derivation and Solana addresses.
//!
//! Every level is non-hardened, so the same path derives from an `fprv` or an `fpub`:
//! `h = HMAC-SHA512(chain_code, point || 0x00 || index_be)`, the left half `t` is added to the
//! key (`A + t*B`, `a + t mod l`) and the right half is the next chain code.

use curve25519_dalek::{EdwardsPoint, Scalar};
use hmac::{Hmac, Mac as _};
use sha2::Sha512;

use crate::{
    chains::ChildKey,
    curve::{ed25519_add_base_multiple, ed25519_scalar},
    errors::DeriveError,
    extended_key::{ExtendedKey, KeyMaterial},
};

type HmacSha512 = Hmac<Sha512>;

fn scalar_to_be(s: &Scalar) -> [u8; 32] {
    let mut be = s.to_bytes();
    be.reverse();
    be
}

fn split_tweak(chain_code: &[u8; 32], point: &[u8; 32], index: u32) -> Result<([u8; 32], [u8; 32]), DeriveError> {
    let mut mac = HmacSha512::new_from_slice(chain_code)
        .map_err(|e| DeriveError::Derivation(format!("hmac key: {e}")))?;
    mac.update(point);
    mac.update(&[0_u8]);
    mac.update(&index.to_be_bytes());
    let out = mac.finalize().into_bytes();
    let (left, right) = out.split_at(32);
    let tweak = left
        .try_into()
        .map_err(|_e| DeriveError::Derivation("hmac output length".into()))?;
    let next = right
        .try_into()
        .map_err(|_e| DeriveError::Derivation("hmac output length".into()))?;
    Ok((tweak, next))
}

pub fn derive_ed25519(key: &ExtendedKey, path: &[u32]) -> Result<ChildKey, DeriveError> {
    let (mut private, mut public) = match &key.key {
        KeyMaterial::Private(be) => {
            let a = ed25519_scalar(be);
            (Some(a), EdwardsPoint::mul_base(&a).compress().to_bytes())
        }
        KeyMaterial::Public(_) => (
            None,
            key.eddsa_point()
                .ok_or_else(|| DeriveError::InvalidExtendedKey("not an ed25519 public key".into()))?,
        ),
    };
    let mut chain_code = key.chain_code;

    for &index in path {
        let (tweak, next) = split_tweak(&chain_code, &public, index)?;
        public = ed25519_add_base_multiple(&public, &tweak)
            .ok_or_else(|| DeriveError::Derivation("public key is not a curve point".into()))?;
        private = private.map(|a| a + ed25519_scalar(&tweak));
        chain_code = next;
    }

    Ok(ChildKey::Eddsa {
        private: private.as_ref().map(scalar_to_be),
        public,
    })
}

/// Base58 of the 32-byte public key.
pub fn address(public: &[u8; 32]) -> String {
    bs58::encode(public).into_string()
}
