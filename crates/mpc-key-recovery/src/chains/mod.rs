//! Per-chain derivation, address rendering and private key export.
//!
//! A closed set of adapters behind one interface. Derivation depends only on the key family:
//! Bitcoin and Ethereum share BIP32 secp256k1 derivation, Solana uses the ed25519 scheme in
//! [`solana`].

pub mod bitcoin;
pub mod evm;
pub mod solana;

use serde::Serialize;
use std::fmt;

use crate::{algorithm::Family, errors::DeriveError, extended_key::ExtendedKey};

pub const PURPOSE: u32 = 44;
pub const TESTNET_COIN_TYPE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
    Solana,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressOptions {
    /// P2PKH instead of P2WPKH (Bitcoin only).
    pub legacy: bool,
    pub testnet: bool,
    /// EIP-55 mixed case (Ethereum only).
    pub checksum: bool,
}

/// `44/coin/account/change/index`, every level non-hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationPath {
    pub coin_type: u32,
    pub account: u32,
    pub change: u32,
    pub index: u32,
}

impl DerivationPath {
    pub const fn levels(&self) -> [u32; 5] {
        [PURPOSE, self.coin_type, self.account, self.change, self.index]
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PURPOSE},{},{},{},{}",
            self.coin_type, self.account, self.change, self.index
        )
    }
}

/// Key material at the end of a derivation path. The private half is present only when
/// derivation started from a private extended key.
#[derive(Clone, PartialEq, Eq)]
pub enum ChildKey {
    Ecdsa {
        private: Option<::bitcoin::secp256k1::SecretKey>,
        public: ::bitcoin::secp256k1::PublicKey,
    },
    Eddsa {
        private: Option<[u8; 32]>,
        public: [u8; 32],
    },
}

impl fmt::Debug for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildKey")
            .field("public_key", &self.public_key_hex())
            .field("has_private", &self.private_key_bytes().is_some())
            .finish_non_exhaustive()
    }
}

impl ChildKey {
    /// Compressed SEC1 for ECDSA, the 32-byte point encoding for EdDSA.
    pub fn public_key_hex(&self) -> String {
        match self {
            Self::Ecdsa { public, .. } => hex::encode(public.serialize()),
            Self::Eddsa { public, .. } => hex::encode(public),
        }
    }

    /// Big-endian private scalar.
    pub fn private_key_bytes(&self) -> Option<[u8; 32]> {
        match self {
            Self::Ecdsa { private, .. } => private.map(|k| k.secret_bytes()),
            Self::Eddsa { private, .. } => *private,
        }
    }

    pub fn neutered(&self) -> Self {
        match self {
            Self::Ecdsa { public, .. } => Self::Ecdsa {
                private: None,
                public: *public,
            },
            Self::Eddsa { public, .. } => Self::Eddsa {
                private: None,
                public: *public,
            },
        }
    }
}

/// One derived address with its keys. Private fields are absent for public-only derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_hex: Option<String>,
    pub public_key_hex: String,
    pub address: String,
    pub path: String,
}

impl Chain {
    pub const ALL: [Self; 3] = [Self::Bitcoin, Self::Ethereum, Self::Solana];

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Bitcoin => "BTC",
            Self::Ethereum => "ETH",
            Self::Solana => "SOL",
        }
    }

    pub const fn family(self) -> Family {
        match self {
            Self::Bitcoin | Self::Ethereum => Family::Ecdsa,
            Self::Solana => Family::Eddsa,
        }
    }

    pub const fn coin_type(self, testnet: bool) -> u32 {
        if testnet {
            return TESTNET_COIN_TYPE;
        }
        match self {
            Self::Bitcoin => 0,
            Self::Ethereum => 60,
            Self::Solana => 501,
        }
    }

    pub const fn path(self, testnet: bool, account: u32, change: u32, index: u32) -> DerivationPath {
        DerivationPath {
            coin_type: self.coin_type(testnet),
            account,
            change,
            index,
        }
    }

    pub fn check_family(self, key: &ExtendedKey) -> Result<(), DeriveError> {
        if key.family == self.family() {
            return Ok(());
        }
        Err(DeriveError::ExtendedKeyMismatch {
            asset: self.symbol().to_owned(),
            expected: match self.family() {
                Family::Ecdsa => "xprv or xpub",
                Family::Eddsa => "fprv or fpub",
            },
        })
    }

    pub fn derive(self, key: &ExtendedKey, path: &DerivationPath) -> Result<ChildKey, DeriveError> {
        self.check_family(key)?;
        match self.family() {
            Family::Ecdsa => bitcoin::derive_secp256k1(key, &path.levels()),
            Family::Eddsa => solana::derive_ed25519(key, &path.levels()),
        }
    }

    pub fn to_address(self, child: &ChildKey, opts: &AddressOptions) -> Result<String, DeriveError> {
        match (self, child) {
            (Self::Bitcoin, ChildKey::Ecdsa { public, .. }) => {
                Ok(bitcoin::address(public, opts.legacy, opts.testnet))
            }
            (Self::Ethereum, ChildKey::Ecdsa { public, .. }) => {
                Ok(evm::address(public, opts.checksum))
            }
            (Self::Solana, ChildKey::Eddsa { public, .. }) => Ok(solana::address(public)),
            (Self::Bitcoin | Self::Ethereum, ChildKey::Eddsa { .. })
            | (Self::Solana, ChildKey::Ecdsa { .. }) => Err(DeriveError::Derivation(format!(
                "{} cannot render an address for this key type",
                self.symbol()
            ))),
        }
    }

    /// Wallet Import Format export. Defined for secp256k1 keys only.
    pub fn to_import_format(self, child: &ChildKey) -> Result<String, DeriveError> {
        if self.family() == Family::Eddsa {
            return Err(DeriveError::UnsupportedOperation(
                "Wallet Import Format is not supported for EdDSA assets".into(),
            ));
        }
        match child {
            ChildKey::Ecdsa {
                private: Some(sk), ..
            } => Ok(bitcoin::wif(sk)),
            ChildKey::Ecdsa { private: None, .. } => Err(DeriveError::UnsupportedOperation(
                "Wallet Import Format needs a private key".into(),
            )),
            ChildKey::Eddsa { .. } => Err(DeriveError::UnsupportedOperation(
                "Wallet Import Format is not supported for EdDSA assets".into(),
            )),
        }
    }

    /// Public key hex and address at `path`, using only the public half of `key`.
    pub fn public_key_verification(
        self,
        key: &ExtendedKey,
        path: &DerivationPath,
        opts: &AddressOptions,
    ) -> Result<(String, String), DeriveError> {
        let child = self.derive(key, path)?.neutered();
        Ok((child.public_key_hex(), self.to_address(&child, opts)?))
    }

    pub fn details(
        self,
        key: &ExtendedKey,
        path: &DerivationPath,
        opts: &AddressOptions,
    ) -> Result<DerivationDetails, DeriveError> {
        let child = self.derive(key, path)?;
        let private_key_hex = child.private_key_bytes().map(hex::encode);
        let wif = if self.family() == Family::Ecdsa && private_key_hex.is_some() {
            Some(self.to_import_format(&child)?)
        } else {
            None
        };
        Ok(DerivationDetails {
            wif,
            private_key_hex,
            public_key_hex: child.public_key_hex(),
            address: self.to_address(&child, opts)?,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
