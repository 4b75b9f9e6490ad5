//! Ledger orchestrator (C10): lifecycle, account registry and subscription
//! fan-out tying the header sync loop, history synchronizer and UTXO
//! reservation gate together behind one public surface.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex as AsyncMutex;

use crate::adapters::{Account, Database, HeaderNotification, Headers, Network, StatusNotification};
use crate::codec;
use crate::coinselect::Spendable;
use crate::config::Config;
use crate::header_sync::HeaderSync;
use crate::history_sync::HistorySynchronizer;
use crate::registry::LedgerVariant;
use crate::reservation::ReservationGate;
use crate::streams::EventStreams;
use crate::tx::Tx;
use crate::{Error, Result};

/// A running ledger: one per wallet/network combination, constructed from
/// a [`LedgerVariant`] plus the four external adapters.
pub struct Ledger {
    variant: LedgerVariant,
    config: Config,
    db: Arc<dyn Database>,
    network: Arc<dyn Network>,
    headers: Arc<dyn Headers>,
    accounts: AsyncMutex<Vec<Arc<dyn Account>>>,
    events: Arc<EventStreams>,
    header_sync: HeaderSync,
    history_sync: Arc<HistorySynchronizer>,
    reservation: ReservationGate,
    fee_per_byte: u64,
}

impl Ledger {
    pub fn new(
        variant: LedgerVariant,
        config: Config,
        db: Arc<dyn Database>,
        network: Arc<dyn Network>,
        headers: Arc<dyn Headers>,
    ) -> Self {
        let events = Arc::new(EventStreams::new());
        let header_sync = HeaderSync::new(headers.clone(), network.clone(), events.clone());
        let history_sync = Arc::new(HistorySynchronizer::new(
            network.clone(),
            db.clone(),
            headers.clone(),
            events.clone(),
            variant.pubkey_address_prefix.len(),
        ));
        let reservation = ReservationGate::new(db.clone());
        let fee_per_byte = config.fee_per_byte.unwrap_or(variant.default_fee_per_byte);
        Self {
            variant,
            config,
            db,
            network,
            headers,
            accounts: AsyncMutex::new(Vec::new()),
            events,
            header_sync,
            history_sync,
            reservation,
            fee_per_byte,
        }
    }

    pub fn id(&self) -> String {
        self.variant.id()
    }

    /// `<data_path>/<symbol>_<network>`, where the database file and
    /// header store both live.
    pub fn path(&self) -> PathBuf {
        self.config.data_path.join(self.id())
    }

    pub fn on_transaction(&self) -> tokio::sync::broadcast::Receiver<crate::streams::TransactionEvent> {
        self.events.subscribe_transactions()
    }

    pub fn on_header(&self) -> tokio::sync::broadcast::Receiver<u64> {
        self.events.subscribe_headers()
    }

    pub fn hash160_to_address(&self, h160: &[u8; 20]) -> String {
        codec::hash160_to_address(&self.variant.pubkey_address_prefix, h160)
    }

    pub fn address_to_hash160(&self, address: &str) -> Result<[u8; 20]> {
        codec::address_to_hash160(address, self.variant.pubkey_address_prefix.len())
    }

    /// Creates the data directory, opens the database, connects the
    /// network, catches headers up to tip, subscribes to header pushes,
    /// and reconciles every registered account.
    pub async fn start(&self) -> Result<()> {
        if !self.path().exists() {
            std::fs::create_dir_all(self.path())
                .map_err(|e| Error::Database(e.to_string()))?;
        }
        self.db.start().await?;
        self.network.start().await?;
        self.network.connected().await?;
        self.headers.touch()?;
        self.header_sync.update_headers().await?;
        self.network.subscribe_headers().await?;
        self.update_accounts().await?;
        Ok(())
    }

    /// Closes the network then the database, in that order.
    pub async fn stop(&self) -> Result<()> {
        self.network.stop().await?;
        self.db.stop().await?;
        Ok(())
    }

    /// Registers `account`; if the network is already connected it is
    /// reconciled immediately rather than waiting for the next `start`.
    pub async fn add_account(&self, account: Arc<dyn Account>) -> Result<()> {
        let already_connected = self.network.is_connected();
        self.accounts.lock().await.push(account.clone());
        if already_connected {
            self.update_account(&account).await?;
        }
        Ok(())
    }

    /// Reconciles every registered account, concurrently.
    pub async fn update_accounts(&self) -> Result<()> {
        let accounts = self.accounts.lock().await.clone();
        let results = join_all(accounts.iter().map(|a| self.update_account(a))).await;
        for r in results {
            r?;
        }
        Ok(())
    }

    /// Gap-fill-and-restore, then subscribe (spec §4.6): first loop
    /// `ensure_address_gap` + parallel history reconciliation until no new
    /// addresses are synthesized, then subscribe every address and
    /// re-reconcile any whose remote status disagrees with the local one.
    pub async fn update_account(&self, account: &Arc<dyn Account>) -> Result<()> {
        loop {
            let new_addresses = account.ensure_address_gap().await?;
            if new_addresses.is_empty() {
                break;
            }
            let results = join_all(new_addresses.iter().map(|a| self.update_history(a))).await;
            for r in results {
                r?;
            }
        }

        let all_addresses = account.get_addresses(None).await?;
        let results = join_all(all_addresses.iter().map(|a| self.subscribe_history(a))).await;
        for r in results {
            r?;
        }
        Ok(())
    }

    async fn subscribe_history(&self, address: &str) -> Result<()> {
        let remote_status = self.network.subscribe_address(address).await?;
        let local_status = self.get_local_status(address).await?;
        if local_status != remote_status {
            self.update_history(address).await?;
        }
        Ok(())
    }

    pub async fn update_history(&self, address: &str) -> Result<()> {
        self.history_sync.update_history(address).await
    }

    /// `process_header` entry point for a pushed header notification.
    pub async fn process_header(&self, push: HeaderNotification) -> Result<()> {
        self.header_sync.process_header(push).await
    }

    /// `process_status` entry point for a pushed address-status notification.
    pub async fn process_status(&self, push: StatusNotification) -> Result<()> {
        let local_status = self.get_local_status(&push.address).await?;
        if local_status != push.status {
            self.update_history(&push.address).await?;
        }
        Ok(())
    }

    /// Runs two background tasks forwarding the network's header and
    /// status push streams into `process_header`/`process_status`. Spawned
    /// once `start()` has subscribed; callers that manage their own
    /// task spawning may instead drive `process_header`/`process_status`
    /// directly from `network.header_notifications()`/`status_notifications()`.
    pub fn spawn_notification_forwarders(self: &Arc<Self>) {
        let ledger = self.clone();
        let mut header_rx = self.network.header_notifications();
        tokio::spawn(async move {
            while let Ok(push) = header_rx.recv().await {
                if let Err(err) = ledger.process_header(push).await {
                    tracing::warn!(%err, "failed to process pushed header");
                }
            }
        });

        let ledger = self.clone();
        let mut status_rx = self.network.status_notifications();
        tokio::spawn(async move {
            while let Ok(push) = status_rx.recv().await {
                if let Err(err) = ledger.process_status(push).await {
                    tracing::warn!(%err, "failed to process pushed status");
                }
            }
        });
    }

    /// `hex(SHA256(history_string))` — the exact digest the remote server
    /// computes, so equality short-circuits a redundant history sync. A
    /// single SHA256 round, not the double round used for txids/merkle
    /// roots elsewhere in this crate.
    pub async fn get_local_status(&self, address: &str) -> Result<String> {
        use sha2::Digest;
        let record = self.db.get_address(address).await?;
        let history = record.map(|r| r.history).unwrap_or_default();
        Ok(hex::encode(sha2::Sha256::digest(history.as_bytes())))
    }

    pub async fn get_transaction(&self, txid: &str) -> Result<Option<Tx>> {
        let record = self.db.get_transaction(txid).await?;
        Ok(record.map(|r| Tx::from_raw(r.raw)))
    }

    pub async fn get_private_key_for_address(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let record = match self.db.get_address(address).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        let accounts = self.accounts.lock().await;
        for account in accounts.iter() {
            if account.id() == record.account_id {
                return Ok(Some(account.get_private_key(record.chain, record.position)?));
            }
        }
        Ok(None)
    }

    /// Selects and reserves UTXOs under the ledger-wide reservation lock.
    pub async fn get_spendable_utxos(
        &self,
        amount: u64,
        funding_accounts: &[Arc<dyn Account>],
    ) -> Result<Vec<Spendable>> {
        self.reservation
            .get_spendable_utxos(amount, funding_accounts, self.fee_per_byte)
            .await
    }

    pub async fn release_outputs(&self, outputs: &[crate::adapters::OutPoint]) -> Result<()> {
        self.db.release_outputs(outputs).await
    }

    /// Forwards `tx`'s raw bytes to the network, returning whatever the
    /// network returns (typically the accepted txid).
    pub async fn broadcast(&self, tx: &Tx) -> Result<String> {
        self.network.broadcast(hex::encode(&tx.raw)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        AddressRecord, HeadersBatch, HistoryEntry, MerkleResponse, OutPoint, SaveMode,
        TransactionRecord, Utxo,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast;

    fn variant() -> LedgerVariant {
        LedgerVariant {
            name: "Test Coin".into(),
            symbol: "TST".into(),
            network_name: "unit".into(),
            pubkey_address_prefix: vec![0x00],
            script_address_prefix: vec![0x05],
            extended_public_key_prefix: vec![0x04, 0x88, 0xb2, 0x1e],
            extended_private_key_prefix: vec![0x04, 0x88, 0xad, 0xe4],
            default_fee_per_byte: 1,
        }
    }

    struct FakeHeaders {
        height: AtomicU64,
    }
    #[async_trait]
    impl Headers for FakeHeaders {
        fn height(&self) -> u64 {
            self.height.load(Ordering::SeqCst)
        }
        async fn connect(&self, _s: u64, _r: Vec<u8>) -> Result<()> {
            Ok(())
        }
        fn merkle_root(&self, height: u64) -> Result<[u8; 32]> {
            Err(Error::HeaderGap(height))
        }
        fn touch(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNetwork {
        connected: AtomicBool,
    }
    #[async_trait]
    impl Network for FakeNetwork {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn start(&self) -> Result<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        async fn connected(&self) -> Result<()> {
            Ok(())
        }
        async fn get_headers(&self, _s: u64, _m: u32) -> Result<HeadersBatch> {
            Ok(HeadersBatch { count: 0, raw: vec![] })
        }
        async fn get_history(&self, _address: &str) -> Result<Vec<HistoryEntry>> {
            Ok(vec![])
        }
        async fn get_transaction(&self, _txid: &str) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn get_merkle(&self, _txid: &str, _height: u64) -> Result<MerkleResponse> {
            Ok(MerkleResponse { merkle: vec![], pos: 0 })
        }
        async fn subscribe_headers(&self) -> Result<()> {
            Ok(())
        }
        async fn subscribe_address(&self, _a: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn broadcast(&self, raw_hex: String) -> Result<String> {
            Ok(raw_hex)
        }
        fn header_notifications(&self) -> broadcast::Receiver<HeaderNotification> {
            broadcast::channel(1).1
        }
        fn status_notifications(&self) -> broadcast::Receiver<StatusNotification> {
            broadcast::channel(1).1
        }
    }

    #[derive(Default)]
    struct FakeDatabase {
        started: AtomicBool,
        addresses: StdMutex<HashMap<String, AddressRecord>>,
    }
    #[async_trait]
    impl Database for FakeDatabase {
        async fn start(&self) -> Result<()> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn get_transaction(&self, _txid: &str) -> Result<Option<TransactionRecord>> {
            Ok(None)
        }
        async fn get_address(&self, address: &str) -> Result<Option<AddressRecord>> {
            Ok(self.addresses.lock().unwrap().get(address).cloned())
        }
        async fn save_transaction_io(
            &self,
            _mode: Option<SaveMode>,
            _tx: &Tx,
            _height: u64,
            _is_verified: bool,
            _address: &str,
            _hash160: [u8; 20],
            _history: String,
        ) -> Result<()> {
            Ok(())
        }
        async fn reserve_outputs(&self, _o: &[OutPoint]) -> Result<()> {
            Ok(())
        }
        async fn release_outputs(&self, _o: &[OutPoint]) -> Result<()> {
            Ok(())
        }
    }

    struct FakeAccount {
        reconciled: Arc<StdMutex<Vec<String>>>,
    }
    #[async_trait]
    impl Account for FakeAccount {
        fn id(&self) -> &str {
            "acct"
        }
        async fn get_unspent_outputs(&self) -> Result<Vec<Utxo>> {
            Ok(vec![])
        }
        async fn ensure_address_gap(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn get_addresses(&self, _max_used_times: Option<u32>) -> Result<Vec<String>> {
            self.reconciled.lock().unwrap().push("addr1".into());
            Ok(vec!["addr1".into()])
        }
        fn get_private_key(&self, _chain: u32, _position: u32) -> Result<Vec<u8>> {
            Ok(vec![])
        }
    }

    fn test_ledger() -> Ledger {
        let config = Config { data_path: std::env::temp_dir(), ..Config::default() };
        Ledger::new(
            variant(),
            config,
            Arc::new(FakeDatabase::default()),
            Arc::new(FakeNetwork::default()),
            Arc::new(FakeHeaders { height: AtomicU64::new(0) }),
        )
    }

    #[test]
    fn id_matches_symbol_network_lowercased() {
        let ledger = test_ledger();
        assert_eq!(ledger.id(), "tst_unit");
    }

    #[tokio::test]
    async fn start_then_stop_completes_without_error() {
        let ledger = test_ledger();
        ledger.start().await.unwrap();
        ledger.stop().await.unwrap();
    }

    #[tokio::test]
    async fn add_account_after_connect_reconciles_immediately() {
        let ledger = test_ledger();
        ledger.start().await.unwrap();

        let reconciled = Arc::new(StdMutex::new(Vec::new()));
        let account: Arc<dyn Account> = Arc::new(FakeAccount { reconciled: reconciled.clone() });
        ledger.add_account(account).await.unwrap();

        assert_eq!(*reconciled.lock().unwrap(), vec!["addr1".to_string()]);
    }

    #[test]
    fn address_round_trips_through_ledger_codec() {
        let ledger = test_ledger();
        let h160 = crate::codec::hash160(b"some pubkey");
        let address = ledger.hash160_to_address(&h160);
        let back = ledger.address_to_hash160(&address).unwrap();
        assert_eq!(h160, back);
    }
}
