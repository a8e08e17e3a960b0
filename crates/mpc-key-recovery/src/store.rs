use crate::{
    config::{NetworkMode, RecoveryToolConfig},
    paths::RecoveryPaths,
};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

fn parse_network_mode_env(s: &str) -> Option<NetworkMode> {
    let v = s.trim().to_lowercase();
    match v.as_str() {
        "mainnet" | "main" => Some(NetworkMode::Mainnet),
        "testnet" | "test" => Some(NetworkMode::Testnet),
        _ => None,
    }
}

/// Environment overrides. They apply to the loaded config only and are never written back.
fn apply_env_overrides(cfg: &mut RecoveryToolConfig) {
    /// Helper: if an env var is set and non-empty, apply `setter` with the trimmed value.
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("MPC_RECOVERY_NETWORK_MODE", |v| match parse_network_mode_env(v) {
        Some(m) => cfg.network_mode = m,
        None => tracing::warn!(value = v, "ignoring unknown MPC_RECOVERY_NETWORK_MODE"),
    });
    apply_env("MPC_RECOVERY_MAX_BATCH", |v| match v.parse::<u32>() {
        Ok(n) if n > 0 => cfg.derive.max_batch = n,
        _ => tracing::warn!(value = v, "ignoring invalid MPC_RECOVERY_MAX_BATCH"),
    });
}

impl ConfigStore {
    pub fn new(paths: &RecoveryPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<RecoveryToolConfig> {
        if !self.path.exists() {
            let cfg = RecoveryToolConfig::default();
            self.save(&cfg)?;
            let mut effective = cfg;
            apply_env_overrides(&mut effective);
            return Ok(effective);
        }

        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let mut cfg: RecoveryToolConfig = toml::from_str(&s).context("parse config.toml")?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &RecoveryToolConfig) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::fsutil::ensure_private_dir(parent)?;
        }
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &s,
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write config.toml")?;
        Ok(())
    }
}
