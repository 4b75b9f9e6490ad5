//! Hash and address codec helpers shared by every ledger variant.
//!
//! Mirrors the narrow primitive set a light client actually needs: the two
//! hashes Bitcoin-derived address formats are built from, Base58Check
//! encode/decode, and the WIF private-key wrapper. None of this depends on
//! a particular ledger's network id; callers supply the version-byte
//! prefixes from their [`crate::registry::LedgerVariant`].

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA256 applied twice, the workhorse hash for txids, headers and checksums.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// RIPEMD160(SHA256(data)) — the standard address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Encodes a `hash160` into a Base58Check address under `pubkey_address_prefix`.
pub fn hash160_to_address(pubkey_address_prefix: &[u8], h160: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(pubkey_address_prefix.len() + 20);
    payload.extend_from_slice(pubkey_address_prefix);
    payload.extend_from_slice(h160);
    bs58::encode(payload).with_check().into_string()
}

/// Decodes a Base58Check address back to its `hash160`, skipping the prefix
/// byte(s). Does **not** re-verify the checksum: by the time an address
/// reaches this function it has usually round-tripped through the wire or
/// the database, and re-checking here would just duplicate work the sender
/// (or [`address_to_hash160_strict`]) already did.
pub fn address_to_hash160(address: &str, prefix_len: usize) -> crate::Result<[u8; 20]> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| crate::Error::Codec(e.to_string()))?;
    if decoded.len() < prefix_len + 20 {
        return Err(crate::Error::Codec("address payload too short".into()));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&decoded[prefix_len..prefix_len + 20]);
    Ok(out)
}

/// Strict variant of [`address_to_hash160`] that verifies the Base58Check
/// checksum before returning the hash160.
pub fn address_to_hash160_strict(address: &str, prefix_len: usize) -> crate::Result<[u8; 20]> {
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| crate::Error::Codec("address checksum verification failed".into()))?;
    if decoded.len() < prefix_len + 20 {
        return Err(crate::Error::Codec("address payload too short".into()));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&decoded[prefix_len..prefix_len + 20]);
    Ok(out)
}

/// Wraps a raw private key in WIF with `prefix` as the leading version byte
/// and the trailing `0x01` compressed-pubkey marker.
pub fn private_key_to_wif(prefix: u8, private_key: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + private_key.len() + 1);
    payload.push(prefix);
    payload.extend_from_slice(private_key);
    payload.push(0x01);
    bs58::encode(payload).with_check().into_string()
}
