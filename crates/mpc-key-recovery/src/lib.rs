//! Offline recovery of MPC wallet master keys from an encrypted backup archive, and
//! BIP44-style address derivation for Bitcoin, Ethereum and Solana from the recovered keys.

#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

pub mod algorithm;
pub mod archive;
pub mod chains;
pub mod cli_output;
pub mod commands;
pub mod config;
pub mod curve;
pub mod derive;
pub mod errors;
pub mod extended_key;
pub mod field;
pub mod fsutil;
pub mod key_store;
pub mod paths;
pub mod reconstruct;
pub mod recovery;
pub mod share;
pub mod store;

#[cfg(test)]
pub mod testkit;
