//! Backup archive parsing: `metadata.json` plus one entry per share.
//!
//! Entry names:
//! - `metadata.json`: the manifest.
//! - `MOBILE*`: JSON `{keyId, userId, deviceId, encryptedKey}` for a mobile share.
//! - `<cosignerId>_<keyId>`: raw RSA-OAEP ciphertext of a cloud share.
//! - `<cosignerId>`: legacy cloud share, only meaningful when the manifest declares one key.

use num_bigint::BigUint;
use secrecy::SecretString;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    io::{Cursor, Read as _},
};
use zeroize::Zeroizing;

use crate::{
    algorithm::AlgorithmId,
    errors::RecoveryError,
    share::{
        decrypt::{decrypt_mobile_share, mobile_share_value, CloudDecryptor},
        player::{cloud_player_id, mobile_player_id},
        ShareOrigin, ShareRecord,
    },
};

pub const METADATA_ENTRY: &str = "metadata.json";
pub const MOBILE_PREFIX: &str = "MOBILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMetadata {
    pub key_id: String,
    pub algorithm: AlgorithmId,
    pub chain_code: [u8; 32],
    pub expected_public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    #[serde(rename = "chainCode")]
    chain_code: Option<String>,
    keys: Option<BTreeMap<String, ManifestKey>>,
    #[serde(rename = "keyId")]
    key_id: Option<String>,
    #[serde(rename = "publicKey")]
    public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestKey {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub algo: String,
    #[serde(rename = "chainCode")]
    pub chain_code: Option<String>,
}

/// The two manifest shapes found in backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    MultiKey {
        chain_code: Option<String>,
        keys: BTreeMap<String, ManifestKey>,
    },
    /// Older backups: a single ECDSA key described at the top level.
    LegacySingleKey {
        chain_code: Option<String>,
        key_id: String,
        public_key: String,
    },
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, RecoveryError> {
        let raw: RawManifest = serde_json::from_slice(bytes)
            .map_err(|e| RecoveryError::MalformedArchive(format!("metadata.json: {e}")))?;
        if let Some(keys) = raw.keys {
            return Ok(Self::MultiKey {
                chain_code: raw.chain_code,
                keys,
            });
        }
        match (raw.key_id, raw.public_key) {
            (Some(key_id), Some(public_key)) => Ok(Self::LegacySingleKey {
                chain_code: raw.chain_code,
                key_id,
                public_key,
            }),
            _ => Err(RecoveryError::MalformedArchive(
                "metadata.json has neither keys nor keyId/publicKey".into(),
            )),
        }
    }

    pub fn into_metadata(self) -> Result<BTreeMap<String, BackupMetadata>, RecoveryError> {
        let mut out = BTreeMap::new();
        match self {
            Self::MultiKey { chain_code, keys } => {
                for (key_id, key) in keys {
                    let algorithm: AlgorithmId = key.algo.parse()?;
                    let chain_code = parse_chain_code(
                        &key_id,
                        key.chain_code.as_deref().or(chain_code.as_deref()),
                    )?;
                    out.insert(
                        key_id.clone(),
                        BackupMetadata {
                            key_id,
                            algorithm,
                            chain_code,
                            expected_public_key: key.public_key,
                        },
                    );
                }
            }
            Self::LegacySingleKey {
                chain_code,
                key_id,
                public_key,
            } => {
                let chain_code = parse_chain_code(&key_id, chain_code.as_deref())?;
                out.insert(
                    key_id.clone(),
                    BackupMetadata {
                        key_id,
                        algorithm: AlgorithmId::EcdsaSecp256k1Legacy,
                        chain_code,
                        expected_public_key: public_key,
                    },
                );
            }
        }
        Ok(out)
    }
}

fn parse_chain_code(key_id: &str, hex_str: Option<&str>) -> Result<[u8; 32], RecoveryError> {
    let unknown = || RecoveryError::UnknownChainCode {
        key_id: key_id.to_owned(),
    };
    let bytes = hex::decode(hex_str.ok_or_else(unknown)?.trim()).map_err(|_e| unknown())?;
    bytes.try_into().map_err(|_e| unknown())
}

#[derive(Deserialize)]
struct MobileEntry {
    #[serde(rename = "keyId")]
    key_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "encryptedKey")]
    encrypted_key: String,
}

/// Metadata plus every decrypted share, grouped by key id.
#[derive(Debug, Clone)]
pub struct ParsedBackup {
    pub metadata: BTreeMap<String, BackupMetadata>,
    pub shares: BTreeMap<String, Vec<ShareRecord>>,
}

/// How a non-manifest entry should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind<'a> {
    Mobile,
    Cloud { cosigner_id: &'a str, key_id: &'a str },
    Ignored,
}

fn classify<'a>(name: &'a str, metadata: &'a BTreeMap<String, BackupMetadata>) -> EntryKind<'a> {
    if name.starts_with(MOBILE_PREFIX) {
        return EntryKind::Mobile;
    }
    if let Some((cosigner_id, key_id)) = name.split_once('_') {
        return EntryKind::Cloud {
            cosigner_id,
            key_id,
        };
    }
    // A bare cosigner id predates multi-key backups.
    match (metadata.len(), metadata.keys().next()) {
        (1, Some(only)) => EntryKind::Cloud {
            cosigner_id: name,
            key_id: only,
        },
        _ => EntryKind::Ignored,
    }
}

/// Reads the archive, decrypts every share and groups them by key id.
pub fn parse_backup(
    archive: &[u8],
    cloud: &CloudDecryptor,
    mobile_passphrase: &SecretString,
) -> Result<ParsedBackup, RecoveryError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| RecoveryError::MalformedArchive(e.to_string()))?;

    let manifest_bytes = match zip.by_name(METADATA_ENTRY) {
        Ok(mut f) => read_entry(&mut f, METADATA_ENTRY)?,
        Err(zip::result::ZipError::FileNotFound) => return Err(RecoveryError::MetadataNotFound),
        Err(e) => return Err(RecoveryError::MalformedArchive(e.to_string())),
    };
    let metadata = Manifest::parse(&manifest_bytes)?.into_metadata()?;

    let mut shares: BTreeMap<String, Vec<ShareRecord>> = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| RecoveryError::MalformedArchive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();
        if name == METADATA_ENTRY {
            continue;
        }
        let data = read_entry(&mut file, &name)?;

        let record = match classify(&name, &metadata) {
            EntryKind::Mobile => mobile_record(&name, &data, &metadata, mobile_passphrase)?,
            EntryKind::Cloud {
                cosigner_id,
                key_id,
            } => {
                if !metadata.contains_key(key_id) {
                    return Err(RecoveryError::KeyIdNotInMetadata(key_id.to_owned()));
                }
                ShareRecord {
                    key_id: key_id.to_owned(),
                    player_id: cloud_player_id(cosigner_id, key_id)?,
                    value: cloud.decrypt_share(&name, &data)?,
                    origin: ShareOrigin::Cloud,
                }
            }
            EntryKind::Ignored => {
                tracing::debug!(entry = %name, "skipping legacy entry in multi-key backup");
                continue;
            }
        };
        tracing::debug!(
            entry = %name,
            key_id = %record.key_id,
            player_id = record.player_id,
            origin = ?record.origin,
            "share decrypted"
        );
        shares.entry(record.key_id.clone()).or_default().push(record);
    }

    if let Some(missing) = metadata.keys().find(|k| !shares.contains_key(*k)) {
        return Err(RecoveryError::KeyIdMissing(missing.clone()));
    }

    tracing::info!(
        keys = metadata.len(),
        entries = zip.len(),
        shares = shares.values().map(Vec::len).sum::<usize>(),
        "backup archive parsed"
    );
    Ok(ParsedBackup { metadata, shares })
}

fn read_entry(r: &mut impl std::io::Read, name: &str) -> Result<Zeroizing<Vec<u8>>, RecoveryError> {
    let mut buf = Zeroizing::new(Vec::new());
    r.read_to_end(&mut buf)
        .map_err(|e| RecoveryError::MalformedArchive(format!("read {name}: {e}")))?;
    Ok(buf)
}

fn mobile_record(
    name: &str,
    data: &[u8],
    metadata: &BTreeMap<String, BackupMetadata>,
    passphrase: &SecretString,
) -> Result<ShareRecord, RecoveryError> {
    let entry: MobileEntry = serde_json::from_slice(data)
        .map_err(|e| RecoveryError::MalformedArchive(format!("{name}: {e}")))?;
    let meta = metadata
        .get(&entry.key_id)
        .ok_or_else(|| RecoveryError::KeyIdNotInMetadata(entry.key_id.clone()))?;
    let ciphertext = hex::decode(entry.encrypted_key.trim())
        .map_err(|e| RecoveryError::MalformedArchive(format!("{name}: encryptedKey: {e}")))?;

    let plain = decrypt_mobile_share(passphrase, &entry.user_id, &ciphertext)?;
    let value: BigUint = mobile_share_value(&plain, meta.algorithm.family())?;
    Ok(ShareRecord {
        player_id: mobile_player_id(&entry.device_id)?,
        key_id: entry.key_id,
        value,
        origin: ShareOrigin::Mobile,
    })
}
