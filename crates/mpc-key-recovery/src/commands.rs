//! Subcommand handlers. `main` parses arguments and prints; everything else happens here.

use eyre::Context as _;
use secrecy::SecretString;
use std::path::PathBuf;

use crate::{
    cli_output,
    config::RecoveryToolConfig,
    derive::{DeriveRequest, IndexSelection},
    errors::{DeriveError, RecoveryError},
    paths::RecoveryPaths,
    recovery::{recover_from_parts, ExtendedKeySet},
};

pub const MOBILE_PASSPHRASE_ENV: &str = "MPC_RECOVERY_MOBILE_PASSPHRASE";
pub const RSA_PASSPHRASE_ENV: &str = "MPC_RECOVERY_RSA_PASSPHRASE";

/// Where recovery passphrases come from.
pub trait PassphraseSource {
    fn mobile(&self) -> eyre::Result<Option<SecretString>>;
    fn rsa(&self) -> eyre::Result<Option<SecretString>>;
}

/// Environment first, then an echo-free terminal prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOrPrompt;

impl PassphraseSource for EnvOrPrompt {
    fn mobile(&self) -> eyre::Result<Option<SecretString>> {
        cli_output::passphrase_from_env_or_prompt(
            MOBILE_PASSPHRASE_ENV,
            "Mobile recovery passphrase: ",
        )
    }

    fn rsa(&self) -> eyre::Result<Option<SecretString>> {
        cli_output::passphrase_from_env_or_prompt(RSA_PASSPHRASE_ENV, "RSA key passphrase: ")
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RecoverArgs {
    /// Backup archive (zip).
    #[arg(long)]
    pub zip: PathBuf,

    /// RSA private key (PEM) that decrypts the cloud shares.
    #[arg(long)]
    pub rsa_key: PathBuf,

    /// Withhold xprv/fprv from the output.
    #[arg(long, default_value_t = false)]
    pub public_only: bool,

    /// Write the result to this file (mode 0600) instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Replace an existing `--out` file.
    #[arg(long, default_value_t = false, requires = "out")]
    pub force: bool,
}

fn is_encrypted_pem(pem: &str) -> bool {
    pem.contains("ENCRYPTED")
}

/// Runs a recovery. Returns the JSON to print, or `None` when it went to `--out`.
pub fn recover(
    args: &RecoverArgs,
    cfg: &RecoveryToolConfig,
    passphrases: &dyn PassphraseSource,
) -> eyre::Result<Option<String>> {
    let archive = std::fs::read(&args.zip)
        .with_context(|| format!("read backup archive {}", args.zip.display()))?;
    let pem = zeroize::Zeroizing::new(
        std::fs::read_to_string(&args.rsa_key)
            .with_context(|| format!("read rsa key {}", args.rsa_key.display()))?,
    );

    let mobile = passphrases.mobile()?.ok_or_else(|| {
        RecoveryError::InvalidInput(format!(
            "mobile recovery passphrase required; set {MOBILE_PASSPHRASE_ENV} or run in a terminal"
        ))
    })?;
    let rsa_passphrase = if is_encrypted_pem(&pem) {
        passphrases.rsa()?
    } else {
        None
    };

    let mut keys = recover_from_parts(&archive, &pem, rsa_passphrase.as_ref(), &mobile)
        .context("recover extended keys")?;
    if keys.is_partial() {
        cli_output::print_partial_recovery(&keys.failed);
    }
    let public_only = args.public_only || !cfg.output.include_private;
    if public_only {
        keys = keys.without_private();
    }

    let json = render(&keys)?;
    match &args.out {
        Some(path) => {
            crate::fsutil::write_secret_output(path, &format!("{json}\n"), args.force)?;
            tracing::info!(path = %path.display(), public_only, "recovered keys written");
            cli_output::print_saved_output(path, public_only);
            Ok(None)
        }
        None => Ok(Some(json)),
    }
}

fn render(keys: &ExtendedKeySet) -> eyre::Result<String> {
    serde_json::to_string_pretty(keys).context("serialize recovered keys")
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeriveArgs {
    /// BTC, ETH or SOL; a `_TEST` suffix selects testnet.
    #[arg(long)]
    pub asset: String,

    /// Extended key: xprv/xpub for BTC and ETH, fprv/fpub for SOL.
    #[arg(long)]
    pub key: String,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub account: i64,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub change: i64,

    #[arg(long, allow_negative_numbers = true, conflicts_with_all = ["index_start", "index_end"])]
    pub index: Option<i64>,

    /// First index of an inclusive range.
    #[arg(long, allow_negative_numbers = true, requires = "index_end")]
    pub index_start: Option<i64>,

    /// Last index of an inclusive range.
    #[arg(long, allow_negative_numbers = true, requires = "index_start")]
    pub index_end: Option<i64>,

    /// P2PKH addresses for Bitcoin instead of native segwit (`--legacy false` to override config).
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub legacy: Option<bool>,

    /// Testnet coin type and address encodings (`--testnet false` to override config).
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub testnet: Option<bool>,

    /// EIP-55 checksummed Ethereum addresses (`--checksum false` for lowercase).
    #[arg(long, action = clap::ArgAction::Set)]
    pub checksum: Option<bool>,
}

impl DeriveArgs {
    /// Fills unset flags from config.
    pub fn to_request(&self, cfg: &RecoveryToolConfig) -> Result<DeriveRequest, DeriveError> {
        let index = match (self.index, self.index_start, self.index_end) {
            (Some(i), None, None) => IndexSelection::Single(i),
            (None, Some(start), Some(end)) => IndexSelection::Range { start, end },
            (None, None, None) => IndexSelection::Single(0),
            (Some(_), _, _) | (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(DeriveError::InvalidRange(
                    "use either --index or both --index-start and --index-end".into(),
                ));
            }
        };
        Ok(DeriveRequest {
            asset: self.asset.clone(),
            extended_key: self.key.trim().to_owned(),
            account: self.account,
            change: self.change,
            index,
            legacy: self.legacy.unwrap_or(cfg.derive.legacy),
            testnet: self.testnet.unwrap_or_else(|| cfg.network_mode.is_testnet()),
            checksum: self.checksum.unwrap_or(cfg.derive.checksum),
        })
    }
}

pub fn derive(args: &DeriveArgs, cfg: &RecoveryToolConfig) -> eyre::Result<String> {
    let details = args
        .to_request(cfg)?
        .plan(cfg.max_batch())?
        .derive()
        .context("derive addresses")?;
    serde_json::to_string_pretty(&details).context("serialize derivation details")
}

pub fn verify(args: &DeriveArgs, cfg: &RecoveryToolConfig) -> eyre::Result<String> {
    let rows = args
        .to_request(cfg)?
        .plan(cfg.max_batch())?
        .verify()
        .context("verify public keys")?;
    serde_json::to_string_pretty(&rows).context("serialize verification")
}

pub fn paths(paths: &RecoveryPaths) -> eyre::Result<String> {
    serde_json::to_string(&serde_json::json!({
      "config_dir": paths.config_dir,
      "data_dir": paths.data_dir,
      "config_file": paths.config_file(),
      "log_file": paths.log_file,
    }))
    .context("serialize paths")
}
