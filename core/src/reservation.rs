//! UTXO reservation gate (C9): coin selection under an exclusive
//! reservation lock spanning estimator collection, selection and the
//! database reservation write, so two concurrent spend attempts can never
//! double-select the same output.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapters::{Account, Database, OutPoint};
use crate::coinselect::{CoinSelector, Spendable};
use crate::fees::dust_threshold_fee;
use crate::Result;

pub struct ReservationGate {
    db: Arc<dyn Database>,
    lock: Mutex<()>,
}

impl ReservationGate {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db, lock: Mutex::new(()) }
    }

    /// Selects and reserves UTXOs from `funding_accounts` covering `amount`
    /// plus the dust-threshold fee at `fee_per_byte`. Returns an empty
    /// vector, with nothing reserved, if selection can't cover the target.
    /// On any failure inside the critical section the lock is still
    /// released (via the `?`-early-return + guard-drop) and nothing is
    /// committed.
    pub async fn get_spendable_utxos(
        &self,
        amount: u64,
        funding_accounts: &[Arc<dyn Account>],
        fee_per_byte: u64,
    ) -> Result<Vec<Spendable>> {
        let _guard = self.lock.lock().await;

        let mut utxos = Vec::new();
        for account in funding_accounts {
            utxos.extend(account.get_unspent_outputs().await?);
        }

        let target = amount as i64 + dust_threshold_fee(fee_per_byte) as i64;
        let selector = CoinSelector::new(utxos, target, fee_per_byte);
        let spendables = selector.select();

        if spendables.is_empty() {
            return Ok(spendables);
        }

        let outpoints: Vec<OutPoint> =
            spendables.iter().map(|s| s.utxo.outpoint.clone()).collect();
        self.db.reserve_outputs(&outpoints).await?;

        Ok(spendables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AddressRecord, SaveMode, TransactionRecord, Utxo};
    use crate::tx::{InputOutput, Tx};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeAccount {
        id: String,
        utxos: Vec<Utxo>,
        db: Arc<FakeDatabase>,
    }
    #[async_trait]
    impl Account for FakeAccount {
        fn id(&self) -> &str {
            &self.id
        }
        async fn get_unspent_outputs(&self) -> Result<Vec<Utxo>> {
            // A real account's backing store excludes outputs the database
            // already has reserved; model that here so the "only one
            // concurrent caller wins" test is meaningful.
            let reserved = self.db.reserved.lock().unwrap();
            Ok(self
                .utxos
                .iter()
                .filter(|u| !reserved.contains(&u.outpoint))
                .cloned()
                .collect())
        }
        async fn ensure_address_gap(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn get_addresses(&self, _max_used_times: Option<u32>) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn get_private_key(&self, _chain: u32, _position: u32) -> Result<Vec<u8>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeDatabase {
        reserved: StdMutex<Vec<OutPoint>>,
        reservation_calls: AtomicU64,
    }
    #[async_trait]
    impl Database for FakeDatabase {
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn get_transaction(&self, _txid: &str) -> Result<Option<TransactionRecord>> {
            Ok(None)
        }
        async fn get_address(&self, _address: &str) -> Result<Option<AddressRecord>> {
            Ok(None)
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
        async fn reserve_outputs(&self, outputs: &[OutPoint]) -> Result<()> {
            self.reservation_calls.fetch_add(1, Ordering::SeqCst);
            self.reserved.lock().unwrap().extend_from_slice(outputs);
            Ok(())
        }
        async fn release_outputs(&self, outputs: &[OutPoint]) -> Result<()> {
            self.reserved.lock().unwrap().retain(|o| !outputs.contains(o));
            Ok(())
        }
    }

    fn utxo(txid: &str, amount: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint { txid: txid.into(), index: 0 },
            output: InputOutput { size: 34, amount: Some(amount) },
            owner_address: "addr".into(),
        }
    }

    #[tokio::test]
    async fn reserves_selected_outputs_on_success() {
        let db = Arc::new(FakeDatabase::default());
        let account: Arc<dyn Account> = Arc::new(FakeAccount {
            id: "acct".into(),
            utxos: vec![utxo("t1", 1000)],
            db: db.clone(),
        });
        let gate = ReservationGate::new(db.clone() as Arc<dyn Database>);

        let spendables = gate.get_spendable_utxos(500, &[account], 1).await.unwrap();
        assert_eq!(spendables.len(), 1);
        assert_eq!(db.reserved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_funds_reserves_nothing() {
        let db = Arc::new(FakeDatabase::default());
        let account: Arc<dyn Account> = Arc::new(FakeAccount {
            id: "acct".into(),
            utxos: vec![utxo("t1", 10)],
            db: db.clone(),
        });
        let gate = ReservationGate::new(db.clone() as Arc<dyn Database>);

        let spendables = gate.get_spendable_utxos(500, &[account], 1).await.unwrap();
        assert!(spendables.is_empty());
        assert_eq!(db.reservation_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn only_one_of_two_concurrent_requests_wins_the_only_utxo() {
        let db = Arc::new(FakeDatabase::default());
        let account: Arc<dyn Account> = Arc::new(FakeAccount {
            id: "acct".into(),
            utxos: vec![utxo("only", 1000)],
            db: db.clone(),
        });
        let gate = Arc::new(ReservationGate::new(db.clone() as Arc<dyn Database>));

        let (r1, r2) = tokio::join!(
            gate.get_spendable_utxos(500, std::slice::from_ref(&account), 1),
            gate.get_spendable_utxos(500, std::slice::from_ref(&account), 1),
        );
        let c1 = r1.unwrap().len();
        let c2 = r2.unwrap().len();
        // Exactly one of the two concurrent callers reserves the sole
        // UTXO; the other sees it already reserved and comes back empty.
        assert_eq!(c1 + c2, 1);
    }
}
