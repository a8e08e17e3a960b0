use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

const APP_NAME: &str = "mpc-key-recovery";
const LOG_FILE_NAME: &str = "mpc-key-recovery.log.jsonl";

#[derive(Debug, Clone)]
pub struct RecoveryPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl RecoveryPaths {
    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knobs.
        if let (Ok(data_dir), Ok(config_dir)) = (
            std::env::var("MPC_RECOVERY_DATA_DIR"),
            std::env::var("MPC_RECOVERY_CONFIG_DIR"),
        ) {
            return Ok(Self::in_dirs(
                PathBuf::from(config_dir),
                PathBuf::from(data_dir),
            ));
        }

        // macOS: ~/Library/Application Support/mpc-key-recovery
        // Linux: ~/.config/mpc-key-recovery
        // Windows: %APPDATA%\\mpc-key-recovery
        let proj = ProjectDirs::from("", "", APP_NAME).context("failed to resolve project dirs")?;
        Ok(Self::in_dirs(
            proj.config_dir().to_path_buf(),
            proj.data_dir().to_path_buf(),
        ))
    }

    pub fn in_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let log_file = data_dir.join(LOG_FILE_NAME);
        Self {
            config_dir,
            data_dir,
            log_file,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.config_dir)?;
        crate::fsutil::ensure_private_dir(&self.data_dir)?;
        Ok(())
    }
}
