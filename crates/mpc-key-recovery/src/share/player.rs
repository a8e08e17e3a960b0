//! Player ids: the share identifier and, for Shamir-shared keys, the interpolation index.

use uuid::Uuid;

use crate::errors::RecoveryError;

/// Id of a cloud cosigner share: `cosigner << 32 | first dword of the key id`.
///
/// The dword is the first four bytes of the key id's big-endian UUID bytes, read little-endian.
pub fn cloud_player_id(cosigner_id: &str, key_id: &str) -> Result<u64, RecoveryError> {
    let cosigner: u32 = cosigner_id
        .trim()
        .parse()
        .map_err(|e| RecoveryError::InvalidCosignerId(format!("{cosigner_id}: {e}")))?;
    let key = Uuid::parse_str(key_id.trim())
        .map_err(|e| RecoveryError::MalformedArchive(format!("key id {key_id}: {e}")))?;
    let bytes = key.as_bytes();
    let dword = [bytes[0], bytes[1], bytes[2], bytes[3]];
    Ok((u64::from(cosigner) << 32) | u64::from(u32::from_le_bytes(dword)))
}

/// Id of a mobile share: the first six bytes of the device UUID, reversed, zero-extended.
pub fn mobile_player_id(device_id: &str) -> Result<u64, RecoveryError> {
    let device = Uuid::parse_str(device_id.trim())
        .map_err(|e| RecoveryError::InvalidCosignerId(format!("device id {device_id}: {e}")))?;
    let b = device.as_bytes();
    Ok(u64::from_le_bytes([b[5], b[4], b[3], b[2], b[1], b[0], 0, 0]))
}
