#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use std::io::Write as _;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

use mpc_key_recovery::{
    cli_output,
    commands::{self, DeriveArgs, EnvOrPrompt, RecoverArgs},
    errors::ErrorReport,
    paths::RecoveryPaths,
    store::ConfigStore,
};

#[derive(Parser, Debug)]
#[command(name = "mpc-key-recovery", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recover the extended master keys (xprv/xpub, fprv/fpub) from a backup archive.
    ///
    /// Passphrases are read from `MPC_RECOVERY_MOBILE_PASSPHRASE` and
    /// `MPC_RECOVERY_RSA_PASSPHRASE`, or prompted for when running in a terminal.
    Recover(RecoverArgs),

    /// Derive addresses (and keys, for a private extended key) along 44/coin/account/change/index.
    Derive(DeriveArgs),

    /// Derive public keys and addresses only, to check a recovered key against known wallets.
    Verify(DeriveArgs),

    /// Print resolved paths (useful for debugging).
    Paths,
}

fn init_logging(paths: &RecoveryPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("mpc-key-recovery.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn print_stdout(s: &str) -> eyre::Result<()> {
    writeln!(std::io::stdout().lock(), "{s}").context("write stdout")
}

fn run(cli: &Cli, paths: &RecoveryPaths) -> eyre::Result<()> {
    let cfg = ConfigStore::new(paths).load_or_init_default()?;
    tracing::debug!(network = cfg.network_mode.as_str(), "config loaded");

    match &cli.cmd {
        Command::Recover(args) => {
            if let Some(json) =
                commands::recover(args, &cfg, &EnvOrPrompt).context("recover failed")?
            {
                print_stdout(&json)?;
            }
            Ok(())
        }
        Command::Derive(args) => print_stdout(&commands::derive(args, &cfg)?),
        Command::Verify(args) => print_stdout(&commands::verify(args, &cfg)?),
        Command::Paths => print_stdout(&commands::paths(paths)?),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = color_eyre::install().and_then(|()| {
        let paths = RecoveryPaths::discover()?;
        paths.ensure_private_dirs()?;
        let _log_guard = init_logging(&paths);
        let res = run(&cli, &paths);
        if let Err(e) = &res {
            tracing::warn!(error = %format!("{e:#}"), "command failed");
        }
        res
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            cli_output::print_error_report(&ErrorReport::from_report(&e));
            ExitCode::FAILURE
        }
    }
}
