//! The narrow transaction shape the synchronization engine consumes.
//!
//! Byte-level transaction encoding/decoding is out of scope for this crate
//! (spec §1): a full parser belongs to a dedicated transaction crate. What
//! the sync engine needs is the identifier, the raw bytes, and an input/
//! output size-and-amount summary cheap enough to compute from the raw
//! bytes' length alone; richer decoding can be layered on top by whatever
//! constructs `Tx::inputs`/`Tx::outputs` for a given ledger variant.

use serde::{Deserialize, Serialize};

use crate::codec::double_sha256;

/// A transaction input or output, as far as coin selection and fee
/// estimation need to know about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputOutput {
    /// Encoded size in bytes, used for per-byte fee estimation.
    pub size: u32,
    /// Amount in minor units. `None` for inputs (the spent amount lives on
    /// the output being referenced); `Some` for outputs.
    pub amount: Option<u64>,
}

impl InputOutput {
    /// A canonical pay-to-pubkey-hash output carrying `amount`. Used by the
    /// reservation gate to derive the dust-threshold fee (spec §4.5).
    pub fn pay_pubkey_hash(amount: u64) -> Self {
        // version(8) + script_len(1) + OP_DUP OP_HASH160 push20 OP_EQUALVERIFY OP_CHECKSIG(25)
        InputOutput { size: 34, amount: Some(amount) }
    }
}

/// A transaction as seen by the sync engine: enough to store, verify
/// inclusion for, and hand to coin selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tx {
    /// Display-order (reversed, hex-equivalent) txid — the key used
    /// everywhere a `txid` string is expected (history strings, db rows,
    /// per-txid locks).
    pub id: String,
    pub raw: Vec<u8>,
    pub base_size: u32,
    pub inputs: Vec<InputOutput>,
    pub outputs: Vec<InputOutput>,
}

impl Tx {
    /// Builds a `Tx` purely from raw bytes, deriving `id` and `base_size`.
    /// `inputs`/`outputs` are left empty; callers that need them (full
    /// coin-selection estimators) attach them separately once a ledger
    /// variant's own (out-of-scope) byte parser has run.
    pub fn from_raw(raw: Vec<u8>) -> Self {
        let id = display_txid(&raw);
        let base_size = raw.len() as u32;
        Tx { id, raw, base_size, inputs: Vec::new(), outputs: Vec::new() }
    }

    /// The txid in internal byte order, as used when verifying Merkle
    /// inclusion (the leaf value).
    pub fn internal_hash(&self) -> [u8; 32] {
        double_sha256(&self.raw)
    }
}

/// Computes the display-form (reversed) hex txid of raw transaction bytes.
pub fn display_txid(raw: &[u8]) -> String {
    let mut h = double_sha256(raw);
    h.reverse();
    hex::encode(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_derives_id_and_size() {
        let raw = b"pretend-this-is-a-signed-transaction".to_vec();
        let tx = Tx::from_raw(raw.clone());
        assert_eq!(tx.base_size as usize, raw.len());
        assert_eq!(tx.id, display_txid(&raw));
        assert_eq!(tx.id.len(), 64);
    }

    #[test]
    fn pay_pubkey_hash_output_has_canonical_size() {
        let out = InputOutput::pay_pubkey_hash(5000);
        assert_eq!(out.size, 34);
        assert_eq!(out.amount, Some(5000));
    }
}
