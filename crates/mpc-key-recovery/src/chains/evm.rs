use alloy::primitives::Address;
use bitcoin::secp256k1::PublicKey;

/// Keccak-256 of the uncompressed key without its `0x04` tag, last 20 bytes.
pub fn address_bytes(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    let (_tag, raw) = uncompressed.split_at(1);
    Address::from_raw_public_key(raw)
}

/// `0x`-prefixed hex, EIP-55 mixed case when `checksum` is set.
pub fn address(public: &PublicKey, checksum: bool) -> String {
    let addr = address_bytes(public);
    if checksum {
        addr.to_checksum(None)
    } else {
        format!("0x{}", hex::encode(addr.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_only_changes_case() -> eyre::Result<()> {
        let pk = PublicKey::from_slice(&hex::decode(
            "02b5586fb410aafd76305705149069f7282de8b7a535ab96a252a41208edf78737",
        )?)?;
        let mixed = address(&pk, true);
        let lower = address(&pk, false);
        assert_eq!(mixed, "0x9f3A41DF8191Cf4605623dD637326CBc63D1d92f");
        assert_eq!(lower, mixed.to_lowercase());
        Ok(())
    }
}
