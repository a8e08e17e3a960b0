//! Depth-0 extended keys: `xprv`/`xpub` for ECDSA and `fprv`/`fpub` for EdDSA.
//!
//! Layout (78 bytes before the base58check checksum):
//! `version(4) | depth(1) | fingerprint(4) | child(4) | chain code(32) | key(33)`.
//! Private keys are `0x00 || scalar(32, BE)`; EdDSA public keys are `0x00 || point(32)`.

use num_bigint::BigUint;

use crate::{algorithm::Family, curve::scalar_to_be32, errors::DeriveError};

pub const PAYLOAD_LEN: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Private([u8; 32]),
    /// Compressed SEC1 for ECDSA, `0x00`-prefixed point encoding for EdDSA.
    Public([u8; 33]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    pub family: Family,
    pub depth: u8,
    pub fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub key: KeyMaterial,
}

impl ExtendedKey {
    pub const fn master(family: Family, chain_code: [u8; 32], key: KeyMaterial) -> Self {
        Self {
            family,
            depth: 0,
            fingerprint: [0; 4],
            child_number: 0,
            chain_code,
            key,
        }
    }

    /// Master private key from a recovered scalar.
    pub fn from_private_scalar(
        family: Family,
        scalar: &BigUint,
        chain_code: [u8; 32],
    ) -> Option<Self> {
        Some(Self::master(
            family,
            chain_code,
            KeyMaterial::Private(scalar_to_be32(scalar)?),
        ))
    }

    /// Master public key. EdDSA accepts the bare 32-byte point and prefixes it with `0x00`.
    pub fn from_public_bytes(family: Family, public: &[u8], chain_code: [u8; 32]) -> Option<Self> {
        let mut key = [0_u8; 33];
        match (family, public.len()) {
            (Family::Eddsa, 32) => key.get_mut(1..)?.copy_from_slice(public),
            (_, 33) => key.copy_from_slice(public),
            _ => return None,
        }
        Some(Self::master(family, chain_code, KeyMaterial::Public(key)))
    }

    pub const fn is_public(&self) -> bool {
        matches!(self.key, KeyMaterial::Public(_))
    }

    pub const fn version(&self) -> [u8; 4] {
        match self.key {
            KeyMaterial::Private(_) => self.family.private_version(),
            KeyMaterial::Public(_) => self.family.public_version(),
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.extend_from_slice(&self.version());
        out.push(self.depth);
        out.extend_from_slice(&self.fingerprint);
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code);
        match &self.key {
            KeyMaterial::Private(k) => {
                out.push(0);
                out.extend_from_slice(k);
            }
            KeyMaterial::Public(k) => out.extend_from_slice(k),
        }
        out
    }

    pub fn encode(&self) -> String {
        bs58::encode(self.to_payload()).with_check().into_string()
    }

    pub fn decode(s: &str) -> Result<Self, DeriveError> {
        let invalid = |why: &str| DeriveError::InvalidExtendedKey(why.to_owned());
        let payload = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| DeriveError::InvalidExtendedKey(e.to_string()))?;
        let payload: [u8; PAYLOAD_LEN] = payload
            .try_into()
            .map_err(|v: Vec<u8>| DeriveError::InvalidExtendedKey(format!("length {}", v.len())))?;

        let (version, rest) = payload.split_at(4);
        let (&depth, rest) = rest.split_first().ok_or_else(|| invalid("truncated"))?;
        let (fingerprint, rest) = rest.split_at(4);
        let (child, rest) = rest.split_at(4);
        let (chain_code, key) = rest.split_at(32);

        let (family, public) = [Family::Ecdsa, Family::Eddsa]
            .into_iter()
            .find_map(|f| {
                if version == f.private_version() {
                    Some((f, false))
                } else if version == f.public_version() {
                    Some((f, true))
                } else {
                    None
                }
            })
            .ok_or_else(|| invalid("unknown version prefix"))?;

        let key = if public {
            if family == Family::Eddsa && key.first() != Some(&0) {
                return Err(invalid("eddsa public key must start with 0x00"));
            }
            KeyMaterial::Public(key.try_into().map_err(|_e| invalid("key length"))?)
        } else {
            let (&lead, scalar) = key.split_first().ok_or_else(|| invalid("key length"))?;
            if lead != 0 {
                return Err(invalid("private key must start with 0x00"));
            }
            KeyMaterial::Private(scalar.try_into().map_err(|_e| invalid("key length"))?)
        };

        Ok(Self {
            family,
            depth,
            fingerprint: fingerprint.try_into().map_err(|_e| invalid("fingerprint"))?,
            child_number: u32::from_be_bytes(child.try_into().map_err(|_e| invalid("child"))?),
            chain_code: chain_code.try_into().map_err(|_e| invalid("chain code"))?,
            key,
        })
    }

    /// Raw public point of an EdDSA public key (32 bytes, prefix stripped).
    pub fn eddsa_point(&self) -> Option<[u8; 32]> {
        match (&self.family, &self.key) {
            (Family::Eddsa, KeyMaterial::Public(k)) => match k.split_first() {
                Some((&0, point)) => point.try_into().ok(),
                _ => None,
            },
            _ => None,
        }
    }
}
