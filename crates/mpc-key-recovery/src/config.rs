use serde::{Deserialize, Serialize};

use crate::derive::DEFAULT_MAX_BATCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkMode {
    pub const fn is_testnet(self) -> bool {
        matches!(self, Self::Testnet)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

/// Defaults for `derive` and `verify` when a flag is not given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriveConfig {
    /// P2PKH instead of native segwit for Bitcoin.
    pub legacy: bool,
    /// EIP-55 mixed-case Ethereum addresses.
    pub checksum: bool,
    /// Upper bound on `index_end - index_start + 1`.
    pub max_batch: u32,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            legacy: false,
            checksum: true,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Include `xprv`/`fprv` in recovery output. `--public-only` always withholds them.
    pub include_private: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_private: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryToolConfig {
    /// Default for the `--testnet` derivation flag.
    pub network_mode: NetworkMode,
    pub derive: DeriveConfig,
    pub output: OutputConfig,
}

impl RecoveryToolConfig {
    /// A zero batch limit would reject every request; treat it as unset.
    pub fn max_batch(&self) -> u32 {
        if self.derive.max_batch == 0 {
            DEFAULT_MAX_BATCH
        } else {
            self.derive.max_batch
        }
    }
}
