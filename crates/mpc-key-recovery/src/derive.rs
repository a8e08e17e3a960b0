//! Derivation requests: validation, asset lookup and batch derivation.

use serde::Serialize;
use std::str::FromStr;

use crate::{
    chains::{AddressOptions, Chain, DerivationDetails},
    errors::DeriveError,
    extended_key::ExtendedKey,
};

pub const DEFAULT_MAX_BATCH: u32 = 1000;
const TESTNET_SUFFIX: &str = "_TEST";

/// A chain plus the network implied by its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub chain: Chain,
    pub testnet: bool,
}

impl FromStr for Asset {
    type Err = DeriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let (symbol, testnet) = match upper.strip_suffix(TESTNET_SUFFIX) {
            Some(base) => (base, true),
            None => (upper.as_str(), false),
        };
        Chain::ALL
            .into_iter()
            .find(|c| c.symbol() == symbol)
            .map(|chain| Self { chain, testnet })
            .ok_or_else(|| DeriveError::UnknownAsset(s.trim().to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSelection {
    Single(i64),
    /// Inclusive on both ends.
    Range { start: i64, end: i64 },
}

/// Caller-facing derivation input. Integers are signed so that negative values reach
/// validation instead of failing to parse.
#[derive(Debug, Clone)]
pub struct DeriveRequest {
    pub asset: String,
    pub extended_key: String,
    pub account: i64,
    pub change: i64,
    pub index: IndexSelection,
    pub legacy: bool,
    pub testnet: bool,
    pub checksum: bool,
}

/// Validated request, ready to derive.
#[derive(Debug, Clone)]
pub struct DerivePlan {
    pub chain: Chain,
    pub key: ExtendedKey,
    pub account: u32,
    pub change: u32,
    pub indices: std::ops::RangeInclusive<u32>,
    pub options: AddressOptions,
}

/// One public-only derivation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicKeyVerification {
    pub public_key_hex: String,
    pub address: String,
    pub path: String,
}

/// Levels must be non-negative and below the hardened range.
fn level(name: &'static str, value: i64) -> Result<u32, DeriveError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v < 0x8000_0000)
        .ok_or(DeriveError::InvalidParameter { name, value })
}

impl DeriveRequest {
    pub fn plan(&self, max_batch: u32) -> Result<DerivePlan, DeriveError> {
        let asset: Asset = self.asset.parse()?;
        let account = level("account", self.account)?;
        let change = level("change", self.change)?;
        let (start, end) = match self.index {
            IndexSelection::Single(i) => {
                let i = level("index", i)?;
                (i, i)
            }
            IndexSelection::Range { start, end } => {
                let s = level("index_start", start)?;
                let e = level("index_end", end)?;
                if e < s {
                    return Err(DeriveError::InvalidRange(format!("{start} -> {end}")));
                }
                (s, e)
            }
        };
        let count = u64::from(end - start) + 1;
        if count > u64::from(max_batch) {
            return Err(DeriveError::InvalidRange(format!(
                "{count} addresses requested, at most {max_batch} per request"
            )));
        }

        let key = ExtendedKey::decode(&self.extended_key)?;
        asset.chain.check_family(&key)?;

        Ok(DerivePlan {
            chain: asset.chain,
            key,
            account,
            change,
            indices: start..=end,
            options: AddressOptions {
                legacy: self.legacy,
                testnet: self.testnet || asset.testnet,
                checksum: self.checksum,
            },
        })
    }
}

impl DerivePlan {
    fn path(&self, index: u32) -> crate::chains::DerivationPath {
        self.chain
            .path(self.options.testnet, self.account, self.change, index)
    }

    /// Derivation details per index. Private fields are filled only for private keys.
    pub fn derive(&self) -> Result<Vec<DerivationDetails>, DeriveError> {
        tracing::info!(
            asset = %self.chain,
            account = self.account,
            change = self.change,
            first = self.indices.start(),
            last = self.indices.end(),
            testnet = self.options.testnet,
            public_only = self.key.is_public(),
            "deriving addresses"
        );
        self.indices
            .clone()
            .map(|i| self.chain.details(&self.key, &self.path(i), &self.options))
            .collect()
    }

    pub fn verify(&self) -> Result<Vec<PublicKeyVerification>, DeriveError> {
        tracing::info!(
            asset = %self.chain,
            account = self.account,
            first = self.indices.start(),
            last = self.indices.end(),
            "verifying public keys"
        );
        self.indices
            .clone()
            .map(|i| {
                let path = self.path(i);
                let (public_key_hex, address) =
                    self.chain
                        .public_key_verification(&self.key, &path, &self.options)?;
                Ok(PublicKeyVerification {
                    public_key_hex,
                    address,
                    path: path.to_string(),
                })
            })
            .collect()
    }
}

/// Validates and derives in one step.
pub fn derive(req: &DeriveRequest, max_batch: u32) -> Result<Vec<DerivationDetails>, DeriveError> {
    req.plan(max_batch)?.derive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use eyre::ContextCompat as _;

    fn request(asset: &str, key: &str, index: IndexSelection) -> DeriveRequest {
        DeriveRequest {
            asset: asset.to_owned(),
            extended_key: key.to_owned(),
            account: 0,
            change: 0,
            index,
            legacy: false,
            testnet: false,
            checksum: true,
        }
    }

    #[test]
    fn asset_symbols_are_case_insensitive() -> eyre::Result<()> {
        assert_eq!(
            "btc".parse::<Asset>()?,
            Asset {
                chain: Chain::Bitcoin,
                testnet: false
            }
        );
        assert_eq!(
            "Sol_Test".parse::<Asset>()?,
            Asset {
                chain: Chain::Solana,
                testnet: true
            }
        );
        let err = "DOGE".parse::<Asset>().err().context("expected error")?;
        assert_eq!(err, DeriveError::UnknownAsset("DOGE".into()));
        Ok(())
    }

    #[test]
    fn batch_derivation_walks_the_inclusive_range() -> eyre::Result<()> {
        let req = request("ETH", testkit::XPUB, IndexSelection::Range { start: 0, end: 2 });
        let out = derive(&req, DEFAULT_MAX_BATCH)?;
        assert_eq!(out.len(), 3);
        let paths: Vec<&str> = out.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["44,60,0,0,0", "44,60,0,0,1", "44,60,0,0,2"]);
        let first = out.first().context("first")?;
        assert_eq!(first.address, "0x9f3A41DF8191Cf4605623dD637326CBc63D1d92f");
        Ok(())
    }

    #[test]
    fn testnet_asset_switches_coin_type() -> eyre::Result<()> {
        let req = request("BTC_TEST", testkit::XPUB, IndexSelection::Single(0));
        let out = derive(&req, DEFAULT_MAX_BATCH)?;
        let first = out.first().context("one result")?;
        assert_eq!(first.path, "44,1,0,0,0");
        assert!(first.address.starts_with("tb1"), "{}", first.address);
        Ok(())
    }

    #[test]
    fn rejects_negative_levels() -> eyre::Result<()> {
        let mut req = request("BTC", testkit::XPUB, IndexSelection::Single(0));
        req.account = -1;
        let err = req.plan(DEFAULT_MAX_BATCH).err().context("expected error")?;
        assert_eq!(
            err,
            DeriveError::InvalidParameter {
                name: "account",
                value: -1
            }
        );

        let neg_index = request("BTC", testkit::XPUB, IndexSelection::Single(-5));
        let err = neg_index.plan(DEFAULT_MAX_BATCH).err().context("expected error")?;
        assert_eq!(err.code(), "invalid_parameter");
        Ok(())
    }

    #[test]
    fn rejects_inverted_and_oversized_ranges() -> eyre::Result<()> {
        let inverted = request("ETH", testkit::XPUB, IndexSelection::Range { start: 5, end: 4 });
        let err = inverted.plan(DEFAULT_MAX_BATCH).err().context("expected error")?;
        assert!(matches!(err, DeriveError::InvalidRange(_)), "{err:?}");

        let big = request("ETH", testkit::XPUB, IndexSelection::Range { start: 0, end: 10 });
        let err = big.plan(10).err().context("expected error")?;
        assert!(matches!(err, DeriveError::InvalidRange(_)), "{err:?}");
        assert!(big.plan(11).is_ok(), "11 addresses fit a batch of 11");
        Ok(())
    }

    #[test]
    fn key_family_must_match_asset() -> eyre::Result<()> {
        let req = request("SOL", testkit::XPRV, IndexSelection::Single(0));
        let err = req.plan(DEFAULT_MAX_BATCH).err().context("expected error")?;
        assert_eq!(
            err,
            DeriveError::ExtendedKeyMismatch {
                asset: "SOL".into(),
                expected: "fprv or fpub"
            }
        );
        Ok(())
    }

    #[test]
    fn verify_uses_public_half_only() -> eyre::Result<()> {
        let from_prv = request("SOL", testkit::FPRV, IndexSelection::Single(0))
            .plan(DEFAULT_MAX_BATCH)?
            .verify()?;
        let from_pub = request("SOL", testkit::FPUB, IndexSelection::Single(0))
            .plan(DEFAULT_MAX_BATCH)?
            .verify()?;
        assert_eq!(from_prv, from_pub);
        let first = from_pub.first().context("one result")?;
        assert_eq!(first.address, "Es8cMivoZYEsCfKBYvZEkgeyYN3saNpzfkoagUBCLy5p");
        Ok(())
    }
}
