use serde::Serialize;
use std::{fmt, str::FromStr};

use crate::{curve::Curve, errors::RecoveryError};

/// Signature family of a key. Chain adapters and extended key prefixes depend only on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ecdsa,
    Eddsa,
}

impl Family {
    pub const fn curve(self) -> Curve {
        match self {
            Self::Ecdsa => Curve::Secp256k1,
            Self::Eddsa => Curve::Ed25519,
        }
    }

    pub const fn private_version(self) -> [u8; 4] {
        match self {
            Self::Ecdsa => [0x04, 0x88, 0xAD, 0xE4],
            Self::Eddsa => [0x03, 0x27, 0x3A, 0x10],
        }
    }

    pub const fn public_version(self) -> [u8; 4] {
        match self {
            Self::Ecdsa => [0x04, 0x88, 0xB2, 0x1E],
            Self::Eddsa => [0x03, 0x27, 0x3E, 0x4B],
        }
    }

    /// Tag carried in the first four bytes of a 36-byte mobile key payload.
    pub const fn mobile_tag(self) -> u32 {
        match self {
            Self::Ecdsa => 0,
            Self::Eddsa => 1,
        }
    }
}

/// How shares of a key combine into the private scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Shamir shares; Lagrange interpolation at zero.
    Lagrange,
    /// Additive shares; plain sum.
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    EcdsaSecp256k1Legacy,
    EcdsaSecp256k1Cmp,
    EddsaEd25519Legacy,
    EddsaEd25519Cmp,
}

impl AlgorithmId {
    pub const ALL: [Self; 4] = [
        Self::EcdsaSecp256k1Legacy,
        Self::EcdsaSecp256k1Cmp,
        Self::EddsaEd25519Legacy,
        Self::EddsaEd25519Cmp,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EcdsaSecp256k1Legacy => "MPC_ECDSA_SECP256K1",
            Self::EcdsaSecp256k1Cmp => "MPC_CMP_ECDSA_SECP256K1",
            Self::EddsaEd25519Legacy => "MPC_EDDSA_ED25519",
            Self::EddsaEd25519Cmp => "MPC_CMP_EDDSA_ED25519",
        }
    }

    pub const fn family(self) -> Family {
        match self {
            Self::EcdsaSecp256k1Legacy | Self::EcdsaSecp256k1Cmp => Family::Ecdsa,
            Self::EddsaEd25519Legacy | Self::EddsaEd25519Cmp => Family::Eddsa,
        }
    }

    pub const fn combine(self) -> Combine {
        match self {
            Self::EcdsaSecp256k1Legacy | Self::EddsaEd25519Legacy => Combine::Lagrange,
            Self::EcdsaSecp256k1Cmp | Self::EddsaEd25519Cmp => Combine::Additive,
        }
    }

    pub const fn curve(self) -> Curve {
        self.family().curve()
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmId {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| RecoveryError::UnknownAlgorithm(s.to_owned()))
    }
}

impl Serialize for AlgorithmId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_metadata_name() -> eyre::Result<()> {
        for a in AlgorithmId::ALL {
            assert_eq!(a.as_str().parse::<AlgorithmId>()?, a);
        }
        Ok(())
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = "MPC_SCHNORR_SECP256K1".parse::<AlgorithmId>().err();
        assert!(
            matches!(err, Some(RecoveryError::UnknownAlgorithm(ref s)) if s == "MPC_SCHNORR_SECP256K1"),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn table_matches_families() {
        assert_eq!(AlgorithmId::EcdsaSecp256k1Cmp.combine(), Combine::Additive);
        assert_eq!(AlgorithmId::EddsaEd25519Legacy.combine(), Combine::Lagrange);
        assert_eq!(AlgorithmId::EddsaEd25519Cmp.curve(), Curve::Ed25519);
        assert_eq!(Family::Eddsa.mobile_tag(), 1);
        assert_eq!(
            u32::from_be_bytes(Family::Ecdsa.private_version()),
            0x0488_ADE4
        );
        assert_eq!(u32::from_be_bytes(Family::Eddsa.public_version()), 0x0327_3E4B);
    }
}
