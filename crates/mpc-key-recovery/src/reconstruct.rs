//! Secret reconstruction: shares of one key id into the private scalar, gated by the
//! public key declared in the backup metadata.

use num_bigint::BigUint;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    algorithm::{AlgorithmId, Combine, Family},
    archive::{BackupMetadata, ParsedBackup},
    errors::RecoveryError,
    share::ShareRecord,
};

/// A private key that matched its declared public key.
#[derive(Clone)]
pub struct ReconstructedKey {
    pub key_id: String,
    pub algorithm: AlgorithmId,
    pub private_key: BigUint,
    pub chain_code: [u8; 32],
    /// 33-byte compressed SEC1 for ECDSA, 32-byte point encoding for EdDSA.
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for ReconstructedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructedKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Per key id result of a recovery. At least one key is always recovered.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub recovered: BTreeMap<String, ReconstructedKey>,
    pub failed: BTreeMap<String, RecoveryError>,
}

impl RecoveryOutcome {
    /// The recovered key of a family. Legacy algorithms win over CMP when both are present.
    pub fn for_family(&self, family: Family) -> Option<&ReconstructedKey> {
        AlgorithmId::ALL
            .into_iter()
            .filter(|a| a.family() == family)
            .find_map(|a| self.recovered.values().find(|k| k.algorithm == a))
    }

    pub fn families(&self) -> BTreeSet<&'static str> {
        self.recovered
            .values()
            .map(|k| match k.algorithm.family() {
                Family::Ecdsa => "ecdsa",
                Family::Eddsa => "eddsa",
            })
            .collect()
    }
}

/// Canonical lowercase hex of a declared public key; EdDSA drops an optional `00` prefix.
fn normalize_expected(family: Family, expected: &str) -> String {
    let lower = expected.trim().to_ascii_lowercase();
    if family == Family::Eddsa && lower.len() == 66 {
        if let Some(rest) = lower.strip_prefix("00") {
            return rest.to_owned();
        }
    }
    lower
}

/// Combines the shares of one key id and checks the result against the metadata.
pub fn reconstruct_key(
    meta: &BackupMetadata,
    shares: &[ShareRecord],
) -> Result<ReconstructedKey, RecoveryError> {
    let curve = meta.algorithm.curve();
    let field = curve.field();

    if shares.is_empty() {
        return Err(RecoveryError::KeyIdMissing(meta.key_id.clone()));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = shares.iter().find(|s| !seen.insert(s.player_id)) {
        return Err(RecoveryError::Internal(format!(
            "duplicate player id {} for key id {}",
            dup.player_id, meta.key_id
        )));
    }

    let values: Vec<BigUint> = shares.iter().map(|s| field.reduce(&s.value)).collect();
    let private_key = match meta.algorithm.combine() {
        Combine::Lagrange => {
            let ids: Vec<BigUint> = shares.iter().map(|s| BigUint::from(s.player_id)).collect();
            field.interpolate_at_zero(&ids, &values).ok_or_else(|| {
                RecoveryError::Internal(format!(
                    "player ids collide modulo the group order for key id {}",
                    meta.key_id
                ))
            })?
        }
        Combine::Additive => field.sum(&values),
    };

    let mismatch = || RecoveryError::PublicKeyNoMatch {
        key_id: meta.key_id.clone(),
    };
    let Some(public_key) = curve.public_key(&private_key) else {
        tracing::warn!(key_id = %meta.key_id, algorithm = %meta.algorithm, "recovered scalar is zero");
        return Err(mismatch());
    };

    let computed = hex::encode(&public_key);
    let expected = normalize_expected(meta.algorithm.family(), &meta.expected_public_key);
    if computed != expected {
        tracing::warn!(
            key_id = %meta.key_id,
            algorithm = %meta.algorithm,
            expected = %meta.expected_public_key,
            computed = %computed,
            "failed to recover key: public key mismatch"
        );
        return Err(mismatch());
    }

    tracing::info!(
        key_id = %meta.key_id,
        algorithm = %meta.algorithm,
        shares = shares.len(),
        "key recovered"
    );
    Ok(ReconstructedKey {
        key_id: meta.key_id.clone(),
        algorithm: meta.algorithm,
        private_key,
        chain_code: meta.chain_code,
        public_key,
    })
}

/// Reconstructs every key id of a parsed backup, each on its own scoped thread.
///
/// Fails only if no key id could be recovered; otherwise failures are listed per key id.
pub fn reconstruct_all(backup: &ParsedBackup) -> Result<RecoveryOutcome, RecoveryError> {
    let results: Vec<(String, Result<ReconstructedKey, RecoveryError>)> =
        std::thread::scope(|s| {
            let handles: Vec<_> = backup
                .metadata
                .iter()
                .map(|(key_id, meta)| {
                    let shares = backup.shares.get(key_id).map_or(&[][..], Vec::as_slice);
                    (key_id, s.spawn(move || reconstruct_key(meta, shares)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(key_id, h)| {
                    let res = h.join().unwrap_or_else(|_panic| {
                        Err(RecoveryError::Internal(format!(
                            "reconstruction of key id {key_id} panicked"
                        )))
                    });
                    (key_id.clone(), res)
                })
                .collect()
        });

    let mut outcome = RecoveryOutcome {
        recovered: BTreeMap::new(),
        failed: BTreeMap::new(),
    };
    for (key_id, res) in results {
        match res {
            Ok(k) => {
                outcome.recovered.insert(key_id, k);
            }
            Err(e) => {
                outcome.failed.insert(key_id, e);
            }
        }
    }

    if outcome.recovered.is_empty() {
        // Surface an unexpected failure as itself; plain mismatches collapse into one error.
        if let Some(other) = outcome
            .failed
            .values()
            .find(|e| !matches!(e, RecoveryError::PublicKeyNoMatch { .. }))
        {
            return Err(other.clone());
        }
        let ids: Vec<&str> = outcome.failed.keys().map(String::as_str).collect();
        return Err(RecoveryError::PublicKeyNoMatch {
            key_id: ids.join(", "),
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{curve::Curve, share::ShareOrigin};
    use eyre::ContextCompat as _;

    fn meta(algorithm: AlgorithmId, secret: &BigUint) -> eyre::Result<BackupMetadata> {
        let pk = algorithm.curve().public_key(secret).context("pubkey")?;
        Ok(BackupMetadata {
            key_id: "3c1b0c2e-7a0e-4b0e-9d7e-1f7a2c3b4d5e".into(),
            algorithm,
            chain_code: [9_u8; 32],
            expected_public_key: hex::encode(pk),
        })
    }

    fn share(player_id: u64, value: BigUint) -> ShareRecord {
        ShareRecord {
            key_id: "3c1b0c2e-7a0e-4b0e-9d7e-1f7a2c3b4d5e".into(),
            player_id,
            value,
            origin: ShareOrigin::Cloud,
        }
    }

    /// Shamir split of `secret` with a degree-1 polynomial.
    fn shamir(curve: Curve, secret: &BigUint, ids: &[u64]) -> Vec<ShareRecord> {
        let field = curve.field();
        let slope = BigUint::from(0x5eed_u32);
        ids.iter()
            .map(|id| {
                let v = field.add(secret, &field.mul(&slope, &BigUint::from(*id)));
                share(*id, v)
            })
            .collect()
    }

    #[test]
    fn lagrange_recovers_secp256k1_key() -> eyre::Result<()> {
        let secret = BigUint::from(0x1234_5678_9abc_def0_u64);
        let m = meta(AlgorithmId::EcdsaSecp256k1Legacy, &secret)?;
        let shares = shamir(Curve::Secp256k1, &secret, &[(1_u64 << 32) | 77, (2_u64 << 32) | 77]);
        let k = reconstruct_key(&m, &shares)?;
        assert_eq!(k.private_key, secret);
        assert_eq!(hex::encode(&k.public_key), m.expected_public_key);
        Ok(())
    }

    #[test]
    fn additive_recovers_ed25519_key() -> eyre::Result<()> {
        let field = Curve::Ed25519.field();
        let secret = BigUint::from(987_654_321_u64);
        let a = BigUint::from(123_456_789_u64);
        let b = field.sub(&secret, &a);
        let m = meta(AlgorithmId::EddsaEd25519Cmp, &secret)?;
        let k = reconstruct_key(&m, &[share(1, a), share(2, b)])?;
        assert_eq!(k.private_key, secret);
        Ok(())
    }

    #[test]
    fn tampered_share_fails_the_public_key_gate() -> eyre::Result<()> {
        let secret = BigUint::from(42_u64);
        let m = meta(AlgorithmId::EddsaEd25519Legacy, &secret)?;
        let mut shares = shamir(Curve::Ed25519, &secret, &[10, 20, 30]);
        let first = shares.first_mut().context("share")?;
        first.value += 1_u8;
        let err = reconstruct_key(&m, &shares).err().context("expected mismatch")?;
        assert!(matches!(err, RecoveryError::PublicKeyNoMatch { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn eddsa_expected_key_may_carry_prefix_and_case() -> eyre::Result<()> {
        let secret = BigUint::from(7_u64);
        let mut m = meta(AlgorithmId::EddsaEd25519Cmp, &secret)?;
        m.expected_public_key = format!("00{}", m.expected_public_key.to_ascii_uppercase());
        reconstruct_key(&m, &[share(1, secret)])?;
        Ok(())
    }

    #[test]
    fn zero_scalar_and_duplicate_ids_are_rejected() -> eyre::Result<()> {
        let secret = BigUint::from(5_u64);
        let m = meta(AlgorithmId::EcdsaSecp256k1Cmp, &secret)?;
        let order = Curve::Secp256k1.order();
        let err = reconstruct_key(&m, &[share(1, order)])
            .err()
            .context("expected mismatch")?;
        assert!(matches!(err, RecoveryError::PublicKeyNoMatch { .. }), "{err:?}");

        let err = reconstruct_key(&m, &[share(4, secret.clone()), share(4, secret)])
            .err()
            .context("expected duplicate error")?;
        assert!(matches!(err, RecoveryError::Internal(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn partial_outcome_lists_failures() -> eyre::Result<()> {
        let good_secret = BigUint::from(11_u64);
        let mut good = meta(AlgorithmId::EcdsaSecp256k1Cmp, &good_secret)?;
        good.key_id = "good".into();
        let mut bad = meta(AlgorithmId::EddsaEd25519Cmp, &BigUint::from(12_u64))?;
        bad.key_id = "bad".into();

        let backup = ParsedBackup {
            metadata: BTreeMap::from([("good".to_owned(), good), ("bad".to_owned(), bad)]),
            shares: BTreeMap::from([
                ("good".to_owned(), vec![share(1, good_secret)]),
                ("bad".to_owned(), vec![share(1, BigUint::from(13_u64))]),
            ]),
        };
        let outcome = reconstruct_all(&backup)?;
        assert!(outcome.recovered.contains_key("good"));
        assert!(outcome.for_family(Family::Ecdsa).is_some());
        assert!(outcome.for_family(Family::Eddsa).is_none());
        assert!(matches!(
            outcome.failed.get("bad"),
            Some(RecoveryError::PublicKeyNoMatch { .. })
        ));
        assert_eq!(outcome.families().into_iter().collect::<Vec<_>>(), vec!["ecdsa"]);
        Ok(())
    }

    #[test]
    fn total_failure_is_an_error() -> eyre::Result<()> {
        let mut m = meta(AlgorithmId::EcdsaSecp256k1Cmp, &BigUint::from(3_u64))?;
        m.key_id = "only".into();
        let backup = ParsedBackup {
            metadata: BTreeMap::from([("only".to_owned(), m)]),
            shares: BTreeMap::from([("only".to_owned(), vec![share(1, BigUint::from(4_u64))])]),
        };
        let err = reconstruct_all(&backup).err().context("expected error")?;
        assert_eq!(
            err,
            RecoveryError::PublicKeyNoMatch {
                key_id: "only".into()
            }
        );
        Ok(())
    }
}
