pub mod decrypt;
pub mod player;

use num_bigint::BigUint;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareOrigin {
    Cloud,
    Mobile,
}

/// One decrypted share of one key. Never logged or printed with its value.
#[derive(Clone)]
pub struct ShareRecord {
    pub key_id: String,
    pub player_id: u64,
    pub value: BigUint,
    pub origin: ShareOrigin,
}

impl std::fmt::Debug for ShareRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareRecord")
            .field("key_id", &self.key_id)
            .field("player_id", &self.player_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
