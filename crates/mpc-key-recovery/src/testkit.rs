//! Test-only helpers: fixture keys, share encryption and an in-memory backup archive builder.

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut as _, KeyIvInit as _};
use eyre::{Context as _, ContextCompat as _};
use num_bigint::BigUint;
use rsa::{pkcs8::DecodePrivateKey as _, Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use std::io::{Cursor, Write as _};

use crate::{
    algorithm::{AlgorithmId, Combine},
    errors::RecoveryError,
    share::{
        decrypt::{CloudDecryptor, MOBILE_KDF_ROUNDS},
        player::{cloud_player_id, mobile_player_id},
    },
};

pub const RSA_PASSPHRASE: &str = "kit-passphrase";
pub const MOBILE_PASSPHRASE: &str = "mobile recovery passphrase";
pub const CHAIN_CODE: &str = "5d90bd21d2273a25d0aea082716bdc4529e007823260ad3479182f6672c25cc4";
pub const ECDSA_KEY_ID: &str = "21926ecc-4a8a-4614-bbac-7c591aa7efdd";
pub const EDDSA_KEY_ID: &str = "5bbd4f68-7b5a-4c9b-b4a8-96b2f2b5d2a1";
pub const DEVICE_ID: &str = "a1b2c3d4-e5f6-4711-8899-aabbccddeeff";
pub const USER_ID: &str = "6f1e7ad2-4b1d-4f0a-a0d5-0b9a2b8c7e11";
/// Master scalars whose extended keys are known.
pub const ECDSA_SECRET: &str = "66b1baf063db6e7152480334ebab0ab098e85f682b784754e46c18c962a1aa9d";
pub const EDDSA_SECRET: &str = "0d74820d02cc2aa09e2d0bcb36aeb92625b3d92c8d202063eab5513fd4453a44";
pub const XPRV: &str = "xprv9s21ZrQH143K2zPNSbKDKusTNW4XVwvTCCEFvcLkeNyauqJJd9UjZg3AtfZbmXa22TFph2NdACUPoWR4sCqMCKQM1j7jRvLuBCF3YoapsX6";
pub const XPUB: &str = "xpub661MyMwAqRbcFUTqYcrDh3pBvXu1uQeJZR9rizkNCiWZnddTAgnz7UMejwX7u4xLmh2JMTtL7DdZmBWGUKa7v836UarassQ3DVFATMzRycV";
pub const FPRV: &str = "fprv4LsXPWzhTTp9ax8NGVwbnRFuT3avVQ4ydHNWcu8hCGZd18TRKxgAzbrpY9bLJRe4Y2AyX9TfQdDPbmqEYoDCTju9QFZbUgdsxsmUgfvuEDK";
pub const FPUB: &str = "fpub8sZZXw2wbqVpURAAA9cCBpv2256rejFtCayHuRAzcYN1qciBxMVmB6UgiDAQTUZh5EP9JZciPQPjKAHyqPYHELqEHWkvo1sxreEJgLyfCJj";

pub const fn rsa_pem() -> &'static str {
    include_str!("../tests/fixtures/cloud_rsa.pem")
}

pub const fn rsa_pkcs1_pem() -> &'static str {
    include_str!("../tests/fixtures/cloud_rsa_pkcs1.pem")
}

pub const fn rsa_encrypted_pem() -> &'static str {
    include_str!("../tests/fixtures/cloud_rsa_encrypted.pem")
}

pub fn cloud_decryptor() -> Result<CloudDecryptor, RecoveryError> {
    CloudDecryptor::from_pem(rsa_pem(), None)
}

pub fn mobile_passphrase() -> SecretString {
    SecretString::new(MOBILE_PASSPHRASE.to_owned().into())
}

pub fn encrypt_cloud(plain: &[u8]) -> eyre::Result<Vec<u8>> {
    let key = RsaPrivateKey::from_pkcs8_pem(rsa_pem()).context("fixture key")?;
    let public = RsaPublicKey::from(&key);
    public
        .encrypt(&mut rsa::rand_core::OsRng, Oaep::new::<sha1::Sha1>(), plain)
        .context("oaep encrypt")
}

/// AES-256-CBC with a PKCS#7 pad, keyed like a mobile backup.
pub fn encrypt_mobile(passphrase: &str, user_id: &str, plain: &[u8]) -> eyre::Result<Vec<u8>> {
    let mut key = [0_u8; 32];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(
        passphrase.as_bytes(),
        user_id.as_bytes(),
        MOBILE_KDF_ROUNDS,
        &mut key,
    );
    let pad = 16 - plain.len() % 16;
    let mut buf = plain.to_vec();
    buf.resize(plain.len() + pad, u8::try_from(pad).unwrap_or(16));
    let len = buf.len();
    cbc::Encryptor::<aes::Aes256>::new(&key.into(), &[0_u8; 16].into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|e| eyre::eyre!("aes-cbc encrypt: {e}"))?;
    Ok(buf)
}

/// Stored zip with the given entries; names ending in `/` become directories.
pub fn zip_entries(entries: &[(&str, Vec<u8>)]) -> eyre::Result<Vec<u8>> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        if name.ends_with('/') {
            w.add_directory(*name, opts).context("add dir")?;
            continue;
        }
        w.start_file(*name, opts).context("start file")?;
        w.write_all(data).context("write entry")?;
    }
    Ok(w.finish().context("finish zip")?.into_inner())
}

#[derive(Debug, Clone)]
pub enum Holder {
    Cloud { cosigner: String, bare_name: bool },
    Mobile { wrap_json: bool },
}

#[derive(Debug, Clone)]
pub struct FixtureShare {
    pub holder: Holder,
    pub value: BigUint,
}

#[derive(Debug, Clone)]
pub struct FixtureKey {
    pub key_id: String,
    pub algorithm: AlgorithmId,
    pub secret: BigUint,
    pub shares: Vec<FixtureShare>,
}

impl FixtureKey {
    fn new(key_id: &str, algorithm: AlgorithmId, secret_hex: &str, holders: Vec<Holder>) -> eyre::Result<Self> {
        let secret = BigUint::parse_bytes(secret_hex.as_bytes(), 16).context("secret hex")?;
        let field = algorithm.curve().field();
        let ids = holders
            .iter()
            .map(|h| match h {
                Holder::Cloud { cosigner, .. } => cloud_player_id(cosigner, key_id),
                Holder::Mobile { .. } => mobile_player_id(DEVICE_ID),
            })
            .collect::<Result<Vec<u64>, _>>()?;

        let n = holders.len();
        let values: Vec<BigUint> = match algorithm.combine() {
            Combine::Lagrange => {
                // Degree n-1, so every share is needed.
                let coeffs: Vec<BigUint> = (1..n)
                    .map(|i| BigUint::from(0x00c0_ffee_u32) * BigUint::from(i) + 0x5eed_u32)
                    .collect();
                ids.iter()
                    .map(|id| {
                        let x = BigUint::from(*id);
                        let high = coeffs
                            .iter()
                            .rev()
                            .fold(BigUint::from(0_u8), |acc, a| field.add(&field.mul(&acc, &x), a));
                        field.add(&field.mul(&high, &x), &secret)
                    })
                    .collect()
            }
            Combine::Additive => {
                let mut parts: Vec<BigUint> = (1..n)
                    .map(|i| BigUint::from(0x1111_1111_u64) * BigUint::from(i))
                    .collect();
                let rest = parts
                    .iter()
                    .fold(secret.clone(), |acc, p| field.sub(&acc, p));
                parts.push(rest);
                parts
            }
        };

        Ok(Self {
            key_id: key_id.to_owned(),
            algorithm,
            secret,
            shares: holders
                .into_iter()
                .zip(values)
                .map(|(holder, value)| FixtureShare { holder, value })
                .collect(),
        })
    }

    fn public_key_hex(&self) -> eyre::Result<String> {
        let pk = self
            .algorithm
            .curve()
            .public_key(&self.secret)
            .ok_or_else(|| eyre::eyre!("secret out of range"))?;
        Ok(hex::encode(pk))
    }
}

/// Builds backup archives from known secrets.
#[derive(Debug, Clone)]
pub struct BackupBuilder {
    pub keys: Vec<FixtureKey>,
    pub legacy_manifest: bool,
    pub extra: Vec<(String, Vec<u8>)>,
}

fn cloud(cosigner: &str) -> Holder {
    Holder::Cloud {
        cosigner: cosigner.to_owned(),
        bare_name: false,
    }
}

impl BackupBuilder {
    /// Shamir ECDSA key and additive EdDSA key, each with two cloud shares and one mobile share.
    pub fn standard() -> eyre::Result<Self> {
        Ok(Self {
            keys: vec![
                FixtureKey::new(
                    ECDSA_KEY_ID,
                    AlgorithmId::EcdsaSecp256k1Legacy,
                    ECDSA_SECRET,
                    vec![cloud("1"), cloud("2"), Holder::Mobile { wrap_json: false }],
                )?,
                FixtureKey::new(
                    EDDSA_KEY_ID,
                    AlgorithmId::EddsaEd25519Cmp,
                    EDDSA_SECRET,
                    vec![cloud("1"), cloud("2"), Holder::Mobile { wrap_json: true }],
                )?,
            ],
            legacy_manifest: false,
            extra: Vec::new(),
        })
    }

    /// Old single-key layout: top-level `keyId`/`publicKey`, cloud entries named by cosigner only.
    /// Three cloud shares, no mobile share.
    pub fn legacy_single_key() -> eyre::Result<Self> {
        let bare = |c: &str| Holder::Cloud {
            cosigner: c.to_owned(),
            bare_name: true,
        };
        Ok(Self {
            keys: vec![FixtureKey::new(
                ECDSA_KEY_ID,
                AlgorithmId::EcdsaSecp256k1Legacy,
                ECDSA_SECRET,
                vec![bare("1"), bare("2"), bare("3")],
            )?],
            legacy_manifest: true,
            extra: Vec::new(),
        })
    }

    pub fn add_raw_entry(&mut self, name: &str, data: Vec<u8>) {
        self.extra.push((name.to_owned(), data));
    }

    /// Removes every share of the key at `idx` and returns its id.
    pub fn drop_key_shares(&mut self, idx: usize) -> eyre::Result<String> {
        let key = self.keys.get_mut(idx).ok_or_else(|| eyre::eyre!("no key {idx}"))?;
        key.shares.clear();
        Ok(key.key_id.clone())
    }

    /// Corrupts one share value of the key at `idx`.
    pub fn tamper_share(&mut self, idx: usize) -> eyre::Result<()> {
        let key = self.keys.get_mut(idx).ok_or_else(|| eyre::eyre!("no key {idx}"))?;
        let share = key.shares.first_mut().ok_or_else(|| eyre::eyre!("no shares"))?;
        share.value += 1_u8;
        Ok(())
    }

    pub fn manifest(&self) -> eyre::Result<serde_json::Value> {
        if self.legacy_manifest {
            let key = self.keys.first().ok_or_else(|| eyre::eyre!("no keys"))?;
            return Ok(serde_json::json!({
                "chainCode": CHAIN_CODE,
                "keyId": key.key_id,
                "publicKey": key.public_key_hex()?,
            }));
        }
        let mut keys = serde_json::Map::new();
        for k in &self.keys {
            keys.insert(
                k.key_id.clone(),
                serde_json::json!({ "publicKey": k.public_key_hex()?, "algo": k.algorithm.as_str() }),
            );
        }
        Ok(serde_json::json!({ "tenantId": "tenant", "chainCode": CHAIN_CODE, "keys": keys }))
    }

    pub fn entries(&self) -> eyre::Result<Vec<(String, Vec<u8>)>> {
        let mut out = vec![(
            crate::archive::METADATA_ENTRY.to_owned(),
            serde_json::to_vec(&self.manifest()?)?,
        )];
        for k in &self.keys {
            for s in &k.shares {
                let share_bytes = crate::curve::scalar_to_be32(&s.value)
                    .ok_or_else(|| eyre::eyre!("share too large"))?;
                match &s.holder {
                    Holder::Cloud {
                        cosigner,
                        bare_name,
                    } => {
                        let name = if *bare_name {
                            cosigner.clone()
                        } else {
                            format!("{cosigner}_{}", k.key_id)
                        };
                        out.push((name, encrypt_cloud(&share_bytes)?));
                    }
                    Holder::Mobile { wrap_json } => {
                        let mut tagged = k.algorithm.family().mobile_tag().to_le_bytes().to_vec();
                        tagged.extend_from_slice(&share_bytes);
                        let plain = if *wrap_json {
                            serde_json::to_vec(&serde_json::json!({ "key": hex::encode(&tagged) }))?
                        } else {
                            tagged
                        };
                        let ct = encrypt_mobile(MOBILE_PASSPHRASE, USER_ID, &plain)?;
                        let entry = serde_json::json!({
                            "keyId": k.key_id,
                            "userId": USER_ID,
                            "deviceId": DEVICE_ID,
                            "encryptedKey": hex::encode(ct),
                        });
                        out.push((format!("MOBILE_{}", k.key_id), serde_json::to_vec(&entry)?));
                    }
                }
            }
        }
        out.extend(self.extra.iter().cloned());
        Ok(out)
    }

    pub fn archive(&self) -> eyre::Result<Vec<u8>> {
        let entries = self.entries()?;
        let refs: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.clone()))
            .collect();
        zip_entries(&refs)
    }
}
