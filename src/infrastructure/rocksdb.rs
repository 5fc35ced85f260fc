use crate::domain::card::{Card, CardId, StatusChange};
use crate::domain::charge::{Charge, ChargeId};
use crate::domain::ports::{CardStore, ChargeStore, ChargeTransaction, ChargeTransactionBox};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing cards.
pub const CF_CARDS: &str = "cards";
/// Column Family for storing charges.
pub const CF_CHARGES: &str = "charges";
/// Column Family indexing charges by card: key is `card_id ++ charge_id`.
pub const CF_CHARGES_BY_CARD: &str = "charges_by_card";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for both `Card` and `Charge` entities using separate
/// Column Families. A charge transaction buffers its rows and applies them at
/// commit as one `WriteBatch`, so every charge and index entry of the
/// transaction becomes visible together or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Serializes card read-modify-write cycles.
    card_writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_CARDS, CF_CHARGES, CF_CHARGES_BY_CARD]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            card_writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(format!("column family {name} not found"))
        })
    }

    fn read_card(&self, id: CardId) -> Result<Option<Card>> {
        let cf = self.cf(CF_CARDS)?;
        match self.db.get_cf(cf, id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_card(&self, card: &Card) -> Result<()> {
        let cf = self.cf(CF_CARDS)?;
        let value = serde_json::to_vec(card)?;
        self.db.put_cf(cf, card.id.as_uuid().as_bytes(), value)?;
        Ok(())
    }

    fn read_charge(&self, key: &[u8]) -> Result<Option<Charge>> {
        let cf = self.cf(CF_CHARGES)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads from the column family so that a failing database surfaces here.
    fn probe(&self, name: &str) -> Result<()> {
        self.db.get_cf(self.cf(name)?, b"")?;
        Ok(())
    }

    fn charge_key(id: ChargeId) -> Vec<u8> {
        id.to_string().into_bytes()
    }

    fn index_key(card_id: CardId, charge_id: ChargeId) -> Vec<u8> {
        let mut key = card_id.as_uuid().as_bytes().to_vec();
        key.extend_from_slice(&Self::charge_key(charge_id));
        key
    }
}

#[async_trait]
impl CardStore for RocksDBStore {
    async fn insert(&self, card: Card) -> Result<()> {
        let _guard = self.card_writes.lock().await;
        if self.read_card(card.id)?.is_some() {
            return Err(PaymentError::InternalError(format!(
                "card {} already exists",
                card.id
            )));
        }
        self.write_card(&card)
    }

    async fn get(&self, id: CardId) -> Result<Option<Card>> {
        self.read_card(id)
    }

    async fn update_status(&self, id: CardId, change: StatusChange) -> Result<Option<Card>> {
        let _guard = self.card_writes.lock().await;
        let Some(mut card) = self.read_card(id)? else {
            return Ok(None);
        };
        change.apply(&mut card)?;
        self.write_card(&card)?;
        Ok(Some(card))
    }

    async fn ping(&self) -> Result<()> {
        self.probe(CF_CARDS)
    }
}

#[async_trait]
impl ChargeStore for RocksDBStore {
    async fn begin(&self) -> Result<ChargeTransactionBox> {
        Ok(Box::new(RocksDBChargeTransaction {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }

    async fn get(&self, id: ChargeId) -> Result<Option<Charge>> {
        self.read_charge(&Self::charge_key(id))
    }

    async fn list_by_card(&self, card_id: CardId) -> Result<Vec<Charge>> {
        let index = self.cf(CF_CHARGES_BY_CARD)?;
        let prefix: &[u8] = card_id.as_uuid().as_bytes();

        let mut charges = Vec::new();
        let iter = self
            .db
            .iterator_cf(index, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(charge) = self.read_charge(&key[prefix.len()..])? {
                charges.push(charge);
            }
        }
        charges.sort_by_key(|c| c.created_at);
        Ok(charges)
    }

    async fn ping(&self) -> Result<()> {
        self.probe(CF_CHARGES)
    }
}

pub struct RocksDBChargeTransaction {
    store: RocksDBStore,
    staged: Vec<Charge>,
}

#[async_trait]
impl ChargeTransaction for RocksDBChargeTransaction {
    async fn insert(&mut self, charge: Charge) -> Result<()> {
        self.staged.push(charge);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let charges = self.store.cf(CF_CHARGES)?;
        let index = self.store.cf(CF_CHARGES_BY_CARD)?;

        let mut batch = WriteBatch::default();
        for charge in &self.staged {
            batch.put_cf(charges, RocksDBStore::charge_key(charge.id), serde_json::to_vec(charge)?);
            batch.put_cf(index, RocksDBStore::index_key(charge.card_id, charge.id), b"");
        }
        self.store.db.write(batch)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
