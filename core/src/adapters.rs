//! External collaborator interfaces (spec §6).
//!
//! `Headers`, `Database`, `Network` and `Account` are the four adapters the
//! synchronization engine consumes but does not implement: header-format
//! parsing, durable storage, wire protocol framing and key-tree management
//! all live in their own crates/binaries. Only the narrow slice of each
//! that the engine actually calls is modeled here, per spec §1's stated
//! scope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::tx::Tx;
use crate::Result;

/// Append-only header log (C3). Implementations own block-format parsing
/// and chain-work validation; this crate only needs height and
/// `merkle_root` lookups plus the append operation.
#[async_trait]
pub trait Headers: Send + Sync {
    /// Number of headers currently stored (and thus the height of the next
    /// header to request).
    fn height(&self) -> u64;

    /// Appends `raw` (concatenated fixed-width header records) starting at
    /// `start_height`, which must equal `self.height()`.
    async fn connect(&self, start_height: u64, raw: Vec<u8>) -> Result<()>;

    /// Internal-byte-order Merkle root of the header at `height`.
    fn merkle_root(&self, height: u64) -> Result<[u8; 32]>;

    /// Ensures the backing header file/table exists, creating it if needed.
    fn touch(&self) -> Result<()>;
}

/// A single remote-history entry: `(txid, height)`, height `0` meaning
/// unconfirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub tx_hash: String,
    pub height: u64,
}

/// `AddressRecord` (spec §3): the persisted view of one address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: String,
    pub account_id: String,
    pub chain: u32,
    pub position: u32,
    /// `"<txid>:<height>:"` pairs in server-sent order, terminated by `:`.
    pub history: String,
}

impl AddressRecord {
    /// Splits `history` into `(txid, height)` pairs, dropping the trailing
    /// empty element the terminating `:` produces. The trailing colon is
    /// load-bearing: it's what makes split-and-drop-last unambiguous for a
    /// zero-entry history (`""` splits to `[""]`, drop-last leaves nothing).
    pub fn local_history(&self) -> Vec<(String, u64)> {
        if self.history.is_empty() {
            return Vec::new();
        }
        let mut parts: Vec<&str> = self.history.split(':').collect();
        parts.pop(); // trailing empty element after the final ':'
        parts
            .chunks(2)
            .filter_map(|pair| match pair {
                [txid, height] => height.parse::<u64>().ok().map(|h| (txid.to_string(), h)),
                _ => None,
            })
            .collect()
    }
}

/// Renders a `(txid, height)` list back into the wire history-string format.
pub fn render_history(entries: &[(String, u64)]) -> String {
    let mut out = String::new();
    for (txid, height) in entries {
        out.push_str(txid);
        out.push(':');
        out.push_str(&height.to_string());
        out.push(':');
    }
    out
}

/// `TransactionRecord` (spec §3): the persisted view of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub raw: Vec<u8>,
    pub height: u64,
    pub is_verified: bool,
}

/// Which write `save_transaction_io` should perform; `None` means the row
/// is unchanged and only the address history column needs rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Insert,
    Update,
}

/// `(txid, output_index)` — the UTXO identifier (spec §3/glossary).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: String,
    pub index: u32,
}

/// Durable store of transactions, addresses, histories and UTXO
/// reservations (C4). The adapter is expected to serialize its own writes
/// internally; the engine only guarantees it never issues two overlapping
/// writes to the *same* logical region (headers vs. transactions vs.
/// reservations) without going through the matching lock.
#[async_trait]
pub trait Database: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;

    async fn get_transaction(&self, txid: &str) -> Result<Option<TransactionRecord>>;
    async fn get_address(&self, address: &str) -> Result<Option<AddressRecord>>;

    #[allow(clippy::too_many_arguments)]
    async fn save_transaction_io(
        &self,
        mode: Option<SaveMode>,
        tx: &Tx,
        height: u64,
        is_verified: bool,
        address: &str,
        hash160: [u8; 20],
        history: String,
    ) -> Result<()>;

    async fn reserve_outputs(&self, outputs: &[OutPoint]) -> Result<()>;
    async fn release_outputs(&self, outputs: &[OutPoint]) -> Result<()>;
}

/// A header-advance push from the network, `{height, hex}` in spec terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderNotification {
    pub height: u64,
    pub raw: Vec<u8>,
}

/// An address-status push from the network: `(address, status_hex)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusNotification {
    pub address: String,
    pub status: String,
}

/// Result of a bulk header request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadersBatch {
    pub count: i64,
    pub raw: Vec<u8>,
}

/// Result of `get_merkle`: sibling branch (display-order hex) plus the
/// left/right position bitmask.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleResponse {
    pub merkle: Vec<[u8; 32]>,
    pub pos: u64,
}

/// Request/response plus subscription streams for headers, history, status
/// and tx (C5). Connection lifecycle, reconnect and timeout policy belong
/// to the implementation; this crate treats `Network` purely as a
/// collaborator it calls into and listens to.
#[async_trait]
pub trait Network: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;

    /// Resolves once the very first connection has been established.
    async fn connected(&self) -> Result<()>;

    async fn get_headers(&self, start_height: u64, max_count: u32) -> Result<HeadersBatch>;
    async fn get_history(&self, address: &str) -> Result<Vec<HistoryEntry>>;
    async fn get_transaction(&self, txid: &str) -> Result<Vec<u8>>;
    async fn get_merkle(&self, txid: &str, height: u64) -> Result<MerkleResponse>;

    async fn subscribe_headers(&self) -> Result<()>;
    /// Subscribes `address` for status pushes, returning its *current*
    /// remote status hex so the caller can short-circuit redundant syncs.
    async fn subscribe_address(&self, address: &str) -> Result<String>;

    async fn broadcast(&self, raw_hex: String) -> Result<String>;

    /// Broadcast stream of header pushes; every subscriber observes the
    /// same pushes in publication order.
    fn header_notifications(&self) -> broadcast::Receiver<HeaderNotification>;
    /// Broadcast stream of address-status pushes.
    fn status_notifications(&self) -> broadcast::Receiver<StatusNotification>;
}

/// A spendable unspent output, annotated with its effective amount (amount
/// minus the marginal fee of spending it as an input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub output: crate::tx::InputOutput,
    pub owner_address: String,
}

impl Utxo {
    /// Effective amount: the output's value minus the marginal cost of
    /// spending it, at `fee_per_byte`.
    pub fn effective_amount(&self, fee_per_byte: u64) -> i64 {
        let amount = self.output.amount.unwrap_or(0) as i64;
        amount - (fee_per_byte as i64 * self.output.size as i64)
    }
}

/// Key-tree management and address derivation (narrow slice used by sync).
#[async_trait]
pub trait Account: Send + Sync {
    /// Stable identifier for this account (its root/public address).
    fn id(&self) -> &str;

    async fn get_unspent_outputs(&self) -> Result<Vec<Utxo>>;

    /// Synthesizes fresh addresses until the unused-address gap is
    /// satisfied, returning the addresses that were newly created (empty
    /// once the gap is already full).
    async fn ensure_address_gap(&self) -> Result<Vec<String>>;

    /// All addresses belonging to this account, optionally filtered to
    /// those used at most `max_used_times` times.
    async fn get_addresses(&self, max_used_times: Option<u32>) -> Result<Vec<String>>;

    fn get_private_key(&self, chain: u32, position: u32) -> Result<Vec<u8>>;
}
