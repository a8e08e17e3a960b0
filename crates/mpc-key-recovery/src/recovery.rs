//! End-to-end recovery: archive and RSA key in, extended master keys out.

use base64::Engine as _;
use secrecy::SecretString;
use serde::Serialize;

use crate::{
    algorithm::Family,
    archive::parse_backup,
    errors::RecoveryError,
    extended_key::ExtendedKey,
    reconstruct::{reconstruct_all, ReconstructedKey, RecoveryOutcome},
    share::decrypt::CloudDecryptor,
};

/// Recovery input as received from a caller: base64 archive and key, plus passphrases.
pub struct RecoveryInput {
    pub zip_base64: String,
    pub rsa_key_base64: String,
    pub rsa_passphrase: Option<SecretString>,
    pub mobile_passphrase: SecretString,
}

impl std::fmt::Debug for RecoveryInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryInput")
            .field("zip_base64_len", &self.zip_base64.len())
            .field("has_rsa_passphrase", &self.rsa_passphrase.is_some())
            .finish_non_exhaustive()
    }
}

/// A key id that did not make it into the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
    pub key_id: String,
    pub code: &'static str,
    pub message: String,
}

/// The four master keys of a backup. Families that failed to recover are absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtendedKeySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xprv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fprv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fpub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_code_ecdsa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_code_eddsa: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<KeyFailure>,
}

impl std::fmt::Debug for ExtendedKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedKeySet")
            .field("xpub", &self.xpub)
            .field("fpub", &self.fpub)
            .field("has_xprv", &self.xprv.is_some())
            .field("has_fprv", &self.fprv.is_some())
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

fn encode_pair(key: &ReconstructedKey) -> Result<(String, String), RecoveryError> {
    let family = key.algorithm.family();
    let prv = ExtendedKey::from_private_scalar(family, &key.private_key, key.chain_code)
        .ok_or_else(|| RecoveryError::Internal(format!("private key of {} too large", key.key_id)))?;
    let publ = ExtendedKey::from_public_bytes(family, &key.public_key, key.chain_code)
        .ok_or_else(|| RecoveryError::Internal(format!("bad public key length for {}", key.key_id)))?;
    Ok((prv.encode(), publ.encode()))
}

impl ExtendedKeySet {
    pub fn from_outcome(outcome: &RecoveryOutcome) -> Result<Self, RecoveryError> {
        let mut set = Self::default();
        if let Some(k) = outcome.for_family(Family::Ecdsa) {
            let (prv, publ) = encode_pair(k)?;
            set.xprv = Some(prv);
            set.xpub = Some(publ);
            set.chain_code_ecdsa = Some(hex::encode(k.chain_code));
        }
        if let Some(k) = outcome.for_family(Family::Eddsa) {
            let (prv, publ) = encode_pair(k)?;
            set.fprv = Some(prv);
            set.fpub = Some(publ);
            set.chain_code_eddsa = Some(hex::encode(k.chain_code));
        }
        set.failed = outcome
            .failed
            .iter()
            .map(|(key_id, e)| KeyFailure {
                key_id: key_id.clone(),
                code: e.code(),
                message: e.to_string(),
            })
            .collect();
        Ok(set)
    }

    /// Drops `xprv` and `fprv`.
    #[must_use]
    pub fn without_private(self) -> Self {
        Self {
            xprv: None,
            fprv: None,
            ..self
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

fn decode_b64(what: &str, s: &str) -> Result<Vec<u8>, RecoveryError> {
    let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| RecoveryError::InvalidInput(format!("{what} is not valid base64: {e}")))
}

/// Recovers from raw archive bytes and a PEM key.
pub fn recover_from_parts(
    archive: &[u8],
    rsa_pem: &str,
    rsa_passphrase: Option<&SecretString>,
    mobile_passphrase: &SecretString,
) -> Result<ExtendedKeySet, RecoveryError> {
    let cloud = CloudDecryptor::from_pem(rsa_pem, rsa_passphrase)?;
    let backup = parse_backup(archive, &cloud, mobile_passphrase)?;
    tracing::info!(
        keys = backup.metadata.len(),
        shares = backup.shares.values().map(Vec::len).sum::<usize>(),
        "backup archive parsed"
    );
    let outcome = reconstruct_all(&backup)?;
    let set = ExtendedKeySet::from_outcome(&outcome)?;
    tracing::info!(
        families = ?outcome.families(),
        failed = set.failed.len(),
        "recovery finished"
    );
    Ok(set)
}

pub fn recover(input: &RecoveryInput) -> Result<ExtendedKeySet, RecoveryError> {
    let archive = decode_b64("backup archive", &input.zip_base64)?;
    let key = zeroize::Zeroizing::new(decode_b64("rsa key", &input.rsa_key_base64)?);
    let pem = std::str::from_utf8(&key)
        .map_err(|_e| RecoveryError::InvalidInput("rsa key is not a utf-8 PEM".into()))?;
    recover_from_parts(
        &archive,
        pem,
        input.rsa_passphrase.as_ref(),
        &input.mobile_passphrase,
    )
}
