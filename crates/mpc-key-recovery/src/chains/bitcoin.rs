use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{Address, CompressedPublicKey, KnownHrp, NetworkKind, PrivateKey};

use crate::{
    chains::ChildKey,
    errors::DeriveError,
    extended_key::{ExtendedKey, KeyMaterial},
};

fn child_numbers(path: &[u32]) -> Result<Vec<ChildNumber>, DeriveError> {
    path.iter()
        .map(|&i| {
            ChildNumber::from_normal_idx(i)
                .map_err(|e| DeriveError::Derivation(format!("path level {i}: {e}")))
        })
        .collect()
}

/// Non-hardened BIP32 derivation from an `xprv` or `xpub`.
///
/// The recovered keys carry mainnet version bytes, so the 78-byte payload is handed to the
/// BIP32 implementation as is.
pub fn derive_secp256k1(key: &ExtendedKey, path: &[u32]) -> Result<ChildKey, DeriveError> {
    let secp = Secp256k1::new();
    let path = child_numbers(path)?;
    let payload = key.to_payload();
    match key.key {
        KeyMaterial::Private(_) => {
            let xprv = Xpriv::decode(&payload)
                .map_err(|e| DeriveError::InvalidExtendedKey(e.to_string()))?;
            let child = xprv
                .derive_priv(&secp, &path)
                .map_err(|e| DeriveError::Derivation(e.to_string()))?;
            Ok(ChildKey::Ecdsa {
                private: Some(child.private_key),
                public: child.private_key.public_key(&secp),
            })
        }
        KeyMaterial::Public(_) => {
            let xpub = Xpub::decode(&payload)
                .map_err(|e| DeriveError::InvalidExtendedKey(e.to_string()))?;
            let child = xpub
                .derive_pub(&secp, &path)
                .map_err(|e| DeriveError::Derivation(e.to_string()))?;
            Ok(ChildKey::Ecdsa {
                private: None,
                public: child.public_key,
            })
        }
    }
}

/// P2WPKH by default, P2PKH when `legacy` is set.
pub fn address(public: &PublicKey, legacy: bool, testnet: bool) -> String {
    let cpk = CompressedPublicKey(*public);
    if legacy {
        let network = if testnet {
            NetworkKind::Test
        } else {
            NetworkKind::Main
        };
        return Address::p2pkh(cpk, network).to_string();
    }
    let hrp = if testnet {
        KnownHrp::Testnets
    } else {
        KnownHrp::Mainnet
    };
    Address::p2wpkh(&cpk, hrp).to_string()
}

/// Compressed mainnet WIF: `base58check(0x80 || key || 0x01)`.
pub fn wif(sk: &SecretKey) -> String {
    PrivateKey::new(*sk, NetworkKind::Main).to_wif()
}
