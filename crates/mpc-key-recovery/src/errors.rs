use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failure, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed archive, manifest or caller-supplied parameters.
    Input,
    /// Key import, decryption or padding failures. Usually a wrong passphrase or RSA key.
    Crypto,
    /// The recovered material does not agree with what the backup declares.
    Integrity,
    Derivation,
    Internal,
}

/// A structured error suitable for printing at the CLI boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: &'static str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed backup archive: {0}")]
    MalformedArchive(String),

    #[error("backup archive doesn't contain metadata.json")]
    MetadataNotFound,

    #[error("chain code in metadata.json is missing or invalid for key id {key_id}")]
    UnknownChainCode { key_id: String },

    #[error("found key id {0} in the backup archive, but it doesn't exist in metadata.json")]
    KeyIdNotInMetadata(String),

    #[error("metadata.json contains key id {0}, which wasn't found in the backup archive")]
    KeyIdMissing(String),

    #[error("invalid cosigner id: {0}")]
    InvalidCosignerId(String),

    #[error("unsupported signature algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("error importing the RSA key for the backup archive - check the key file and its passphrase")]
    KeyImport,

    #[error("cloud share decryption failed for {entry} - make sure the RSA key belongs to this backup")]
    ShareDecrypt { entry: String },

    #[error("mobile key decryption failed - make sure the mobile recovery passphrase is correct")]
    Padding,

    #[error("computed public key does not match expected public key for key id {key_id} (archive inconsistency)")]
    PublicKeyNoMatch { key_id: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecoveryError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::MalformedArchive(_)
            | Self::MetadataNotFound
            | Self::UnknownChainCode { .. }
            | Self::KeyIdNotInMetadata(_)
            | Self::KeyIdMissing(_)
            | Self::InvalidCosignerId(_) => ErrorKind::Input,
            Self::KeyImport | Self::ShareDecrypt { .. } | Self::Padding => ErrorKind::Crypto,
            Self::UnknownAlgorithm(_) | Self::PublicKeyNoMatch { .. } => ErrorKind::Integrity,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::MalformedArchive(_) => "malformed_archive",
            Self::MetadataNotFound => "metadata_not_found",
            Self::UnknownChainCode { .. } => "unknown_chain_code",
            Self::KeyIdNotInMetadata(_) => "key_id_not_in_metadata",
            Self::KeyIdMissing(_) => "key_id_missing",
            Self::InvalidCosignerId(_) => "invalid_cosigner_id",
            Self::UnknownAlgorithm(_) => "unknown_algorithm",
            Self::KeyImport => "key_import",
            Self::ShareDecrypt { .. } => "share_decrypt",
            Self::Padding => "padding",
            Self::PublicKeyNoMatch { .. } => "public_key_no_match",
            Self::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("invalid {name}: {value} (must be a non-negative 32-bit integer)")]
    InvalidParameter { name: &'static str, value: i64 },

    #[error("invalid index range: {0}")]
    InvalidRange(String),

    #[error("invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("extended key does not fit asset {asset}: expected {expected}")]
    ExtendedKeyMismatch {
        asset: String,
        expected: &'static str,
    },

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),
}

impl DeriveError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAsset(_)
            | Self::InvalidParameter { .. }
            | Self::InvalidRange(_)
            | Self::InvalidExtendedKey(_)
            | Self::ExtendedKeyMismatch { .. } => ErrorKind::Input,
            Self::UnsupportedOperation(_) | Self::Derivation(_) => ErrorKind::Derivation,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownAsset(_) => "unknown_asset",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::InvalidRange(_) => "invalid_range",
            Self::InvalidExtendedKey(_) => "invalid_extended_key",
            Self::ExtendedKeyMismatch { .. } => "extended_key_mismatch",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::Derivation(_) => "derivation_failed",
        }
    }
}

impl From<&RecoveryError> for ErrorReport {
    fn from(e: &RecoveryError) -> Self {
        Self::new(e.code(), e.kind(), e.to_string())
    }
}

impl From<&DeriveError> for ErrorReport {
    fn from(e: &DeriveError) -> Self {
        Self::new(e.code(), e.kind(), e.to_string())
    }
}

impl ErrorReport {
    /// Builds a report from an `eyre` chain, preferring a typed error anywhere in it.
    pub fn from_report(err: &eyre::Report) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<RecoveryError>() {
                return e.into();
            }
            if let Some(e) = cause.downcast_ref::<DeriveError>() {
                return e.into();
            }
        }
        Self::new("error", ErrorKind::Internal, format!("{err:#}"))
    }
}
