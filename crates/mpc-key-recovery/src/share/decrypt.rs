//! Share decryption for the two share origins.
//!
//! Cloud shares are RSA-OAEP (SHA-1) ciphertexts under the backup's RSA key. Mobile shares are
//! AES-256-CBC (zero IV) under a key stretched from the recovery passphrase with
//! PBKDF2-HMAC-SHA1, salted with the user id.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut as _, KeyIvInit as _};
use num_bigint::BigUint;
use rsa::{pkcs1::DecodeRsaPrivateKey as _, pkcs8::DecodePrivateKey as _, Oaep, RsaPrivateKey};
use secrecy::{ExposeSecret as _, SecretString};
use zeroize::Zeroizing;

use crate::{algorithm::Family, errors::RecoveryError};

pub const MOBILE_KDF_ROUNDS: u32 = 10_000;
const BLOCK_LEN: usize = 16;
const TAGGED_SHARE_LEN: usize = 36;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// The backup's RSA private key, imported once and used for every cloud share.
pub struct CloudDecryptor {
    key: RsaPrivateKey,
}

impl std::fmt::Debug for CloudDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudDecryptor").finish_non_exhaustive()
    }
}

impl CloudDecryptor {
    /// Imports a PKCS#8 (optionally encrypted) or PKCS#1 PEM private key.
    pub fn from_pem(pem: &str, passphrase: Option<&SecretString>) -> Result<Self, RecoveryError> {
        let pem = pem.trim();
        if let Some(pass) = passphrase {
            if let Ok(key) =
                RsaPrivateKey::from_pkcs8_encrypted_pem(pem, pass.expose_secret().as_bytes())
            {
                return Ok(Self { key });
            }
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(Self { key });
        }
        RsaPrivateKey::from_pkcs1_pem(pem)
            .map(|key| Self { key })
            .map_err(|e| {
                tracing::debug!(error = %e, "rsa key import failed");
                RecoveryError::KeyImport
            })
    }

    /// Raw plaintext of one cloud share. `entry` names the archive entry for error reporting.
    pub fn decrypt(&self, entry: &str, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, RecoveryError> {
        self.key
            .decrypt(Oaep::new::<sha1::Sha1>(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| {
                tracing::debug!(entry, error = %e, "oaep decryption failed");
                RecoveryError::ShareDecrypt {
                    entry: entry.to_owned(),
                }
            })
    }

    pub fn decrypt_share(&self, entry: &str, ciphertext: &[u8]) -> Result<BigUint, RecoveryError> {
        let plain = self.decrypt(entry, ciphertext)?;
        Ok(BigUint::from_bytes_be(&plain))
    }
}

/// One-shot cloud share decryption: import the key, decrypt, return the plaintext bytes.
pub fn decrypt_cloud_share(
    pem: &str,
    passphrase: Option<&SecretString>,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, RecoveryError> {
    CloudDecryptor::from_pem(pem, passphrase)?.decrypt("cloud share", ciphertext)
}

/// Decrypts a mobile key blob and strips its padding.
pub fn decrypt_mobile_share(
    passphrase: &SecretString,
    user_id: &str,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, RecoveryError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(RecoveryError::Padding);
    }

    let mut wrap_key = Zeroizing::new([0_u8; 32]);
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(
        passphrase.expose_secret().as_bytes(),
        user_id.as_bytes(),
        MOBILE_KDF_ROUNDS,
        wrap_key.as_mut_slice(),
    );
    let iv = [0_u8; BLOCK_LEN];
    let cipher = Aes256CbcDec::new_from_slices(wrap_key.as_slice(), &iv)
        .map_err(|e| RecoveryError::Internal(format!("aes key setup: {e}")))?;

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    let plain_len = cipher
        .decrypt_padded_mut::<NoPadding>(buf.as_mut_slice())
        .map_err(|_e| RecoveryError::Padding)?
        .len();
    buf.truncate(plain_len);

    let unpadded = unpad(&buf)?;
    buf.truncate(unpadded);
    Ok(buf)
}

/// Length of `buf` without its trailing pad.
///
/// The last byte `n` must be at most the block size and the last `n` bytes must all equal `n`.
/// `n == 0` passes and removes nothing.
fn unpad(buf: &[u8]) -> Result<usize, RecoveryError> {
    let (&pad, _) = buf.split_last().ok_or(RecoveryError::Padding)?;
    let pad_len = usize::from(pad);
    if pad_len > BLOCK_LEN {
        return Err(RecoveryError::Padding);
    }
    let start = buf.len().checked_sub(pad_len).ok_or(RecoveryError::Padding)?;
    let tail = buf.get(start..).ok_or(RecoveryError::Padding)?;
    if !tail.iter().all(|b| *b == pad) {
        return Err(RecoveryError::Padding);
    }
    Ok(start)
}

/// Turns decrypted mobile key material into the share integer.
///
/// A JSON object with a hex `key` field is unwrapped first. A 36-byte payload carries a
/// little-endian algorithm tag ahead of the 32-byte share and the tag must match `family`.
pub fn mobile_share_value(plain: &[u8], family: Family) -> Result<BigUint, RecoveryError> {
    let unwrapped = unwrap_json_key(plain);
    let data: &[u8] = unwrapped.as_deref().map_or(plain, |v| v.as_slice());

    if data.len() == TAGGED_SHARE_LEN {
        let (tag, share) = data.split_at(4);
        let tag = u32::from_le_bytes(
            tag.try_into()
                .map_err(|_e| RecoveryError::Internal("tag length".into()))?,
        );
        if tag != family.mobile_tag() {
            return Err(RecoveryError::UnknownAlgorithm(format!(
                "mobile key algorithm tag {tag}"
            )));
        }
        return Ok(BigUint::from_bytes_be(share));
    }
    Ok(BigUint::from_bytes_be(data))
}

fn unwrap_json_key(plain: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    let v: serde_json::Value = serde_json::from_slice(plain).ok()?;
    let key = v.get("key")?.as_str()?;
    hex::decode(key.trim()).ok().map(Zeroizing::new)
}
