//! Per-byte fee helpers (recovered from `torba.baseledger.BaseLedger` —
//! `get_input_output_fee` / `get_transaction_base_fee`), used by coin
//! selection to compute the dust-threshold fee spec §4.5 references.

use crate::tx::{InputOutput, Tx};

/// Fee contributed by spending or creating a single input/output, at
/// `fee_per_byte`.
pub fn input_output_fee(fee_per_byte: u64, io: &InputOutput) -> u64 {
    fee_per_byte * io.size as u64
}

/// Fee for a transaction's header and all its outputs, excluding inputs.
pub fn transaction_base_fee(fee_per_byte: u64, tx: &Tx) -> u64 {
    fee_per_byte * tx.base_size as u64
}

/// The dust-threshold fee: the marginal cost of a canonical
/// pay-to-pubkey-hash output at `fee_per_byte` (spec §4.5).
pub fn dust_threshold_fee(fee_per_byte: u64) -> u64 {
    input_output_fee(fee_per_byte, &InputOutput::pay_pubkey_hash(0))
}
