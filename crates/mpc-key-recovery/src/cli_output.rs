//! Centralised helpers for user-facing CLI output written to stderr.
//!
//! Machine-readable results go to stdout from `main`; everything here is for the operator.

use secrecy::SecretString;
use std::io::{IsTerminal as _, Write as _};
use std::path::Path;

use crate::errors::ErrorReport;
use crate::recovery::KeyFailure;

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

/// Reads a passphrase from `env_var`, or prompts on the terminal without echo.
///
/// Returns `Ok(None)` when the variable is unset and there is no terminal to ask on.
pub fn passphrase_from_env_or_prompt(
    env_var: &str,
    prompt: &str,
) -> eyre::Result<Option<SecretString>> {
    if let Ok(v) = std::env::var(env_var) {
        return Ok(Some(SecretString::new(v.into())));
    }
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let v = rpassword::prompt_password(prompt)
        .map_err(|e| eyre::eyre!("read passphrase from terminal: {e}"))?;
    Ok(Some(SecretString::new(v.into())))
}

/// Warns that some key ids could not be recovered. The output still holds the ones that were.
pub fn print_partial_recovery(failed: &[KeyFailure]) {
    let mut msg = String::from("mpc-key-recovery: partial recovery, these keys were skipped:");
    for f in failed {
        msg.push_str("\n  ");
        msg.push_str(&f.key_id);
        msg.push_str(" (");
        msg.push_str(f.code);
        msg.push_str("): ");
        msg.push_str(&f.message);
    }
    stderr_writeln(&msg);
}

pub fn print_saved_output(path: &Path, public_only: bool) {
    let what = if public_only {
        "public keys"
    } else {
        "extended keys (including private keys)"
    };
    stderr_writeln(&format!(
        "mpc-key-recovery: wrote recovered {what} to {} (mode 0600).",
        path.display()
    ));
}

/// Emits the structured error as one JSON line on stderr.
pub fn print_error_report(report: &ErrorReport) {
    let line = serde_json::to_string(report).unwrap_or_else(|_e| {
        format!(
            r#"{{"code":"{}","kind":"internal","message":"unprintable error"}}"#,
            report.code
        )
    });
    stderr_writeln(&line);
}
