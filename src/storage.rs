//! Document store backed by RocksDB.
//!
//! Collections map to column families; weekly `ledger_<shard>` buckets are
//! created on demand. Mutating operations that must observe a consistent
//! document (conditional block appends, sequence increments, field patches)
//! run under a store-wide write mutex, reproducing the single-document
//! atomicity the services rely on.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{LedgerError, LedgerResult};
use crate::types::{Block, BlockTransactionRef, Transaction};

pub const COLLECTION_ELEMENTS: &str = "elements";
pub const COLLECTION_BALANCES: &str = "balances";
pub const COLLECTION_SEQUENCES: &str = "sequences";
pub const COLLECTION_BLOCKS: &str = "blocks";
pub const LEDGER_PREFIX: &str = "ledger_";

const CF_BLOCK_NUMBERS: &str = "block_numbers";
const CF_BLOCK_HEIGHTS: &str = "block_heights";

const DOC_PREFIX: &[u8] = b"d:";
const HASH_PREFIX: &[u8] = b"h:";

pub struct Store {
    db: DBWithThreadMode<MultiThreaded>,
    ledgers: RwLock<HashSet<String>>,
    write_lock: Mutex<()>,
}

fn doc_key(id: &str) -> Vec<u8> {
    let mut key = DOC_PREFIX.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

fn hash_key(hash: &str) -> Vec<u8> {
    let mut key = HASH_PREFIX.to_vec();
    key.extend_from_slice(hash.as_bytes());
    key
}

impl Store {
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut names: Vec<String> = vec![
            COLLECTION_ELEMENTS.to_string(),
            COLLECTION_BALANCES.to_string(),
            COLLECTION_SEQUENCES.to_string(),
            COLLECTION_BLOCKS.to_string(),
            CF_BLOCK_NUMBERS.to_string(),
            CF_BLOCK_HEIGHTS.to_string(),
        ];
        if let Ok(existing) = DBWithThreadMode::<MultiThreaded>::list_cf(&opts, path) {
            for name in existing {
                if name != "default" && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        let ledgers = names
            .iter()
            .filter(|name| name.starts_with(LEDGER_PREFIX))
            .cloned()
            .collect::<HashSet<_>>();
        let descriptors = names
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self {
            db,
            ledgers: RwLock::new(ledgers),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> LedgerResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Config(format!("missing column family: {name}")))
    }

    /// Creates the weekly ledger bucket if it does not exist yet.
    pub fn ensure_ledger(&self, name: &str) -> LedgerResult<()> {
        if self.ledgers.read().contains(name) {
            return Ok(());
        }
        let mut ledgers = self.ledgers.write();
        if !ledgers.contains(name) {
            self.db.create_cf(name, &Options::default())?;
            ledgers.insert(name.to_string());
        }
        Ok(())
    }

    pub fn ledger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ledgers.read().iter().cloned().collect();
        names.sort();
        names
    }

    // Generic document operations.

    pub fn get_doc<T: DeserializeOwned>(&self, collection: &str, id: &str) -> LedgerResult<Option<T>> {
        let cf = self.cf(collection)?;
        match self.db.get_cf(&cf, doc_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_doc<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> LedgerResult<()> {
        let cf = self.cf(collection)?;
        self.db.put_cf(&cf, doc_key(id), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Atomic read-modify-write of one document. Returns `false` when the
    /// document does not exist.
    pub fn modify_doc<T, F>(&self, collection: &str, id: &str, mutate: F) -> LedgerResult<bool>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T),
    {
        let _guard = self.write_lock.lock();
        let Some(mut doc) = self.get_doc::<T>(collection, id)? else {
            return Ok(false);
        };
        mutate(&mut doc);
        self.put_doc(collection, id, &doc)?;
        Ok(true)
    }

    /// Fetches a document, inserting the provided default first when absent.
    pub fn get_or_insert_doc<T, F>(&self, collection: &str, id: &str, default: F) -> LedgerResult<T>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce() -> T,
    {
        if let Some(doc) = self.get_doc::<T>(collection, id)? {
            return Ok(doc);
        }
        let _guard = self.write_lock.lock();
        if let Some(doc) = self.get_doc::<T>(collection, id)? {
            return Ok(doc);
        }
        let doc = default();
        self.put_doc(collection, id, &doc)?;
        Ok(doc)
    }

    /// Stores a document and records its content hash in the collection's
    /// hash index.
    pub fn put_doc_with_hash<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        hash: &str,
        doc: &T,
    ) -> LedgerResult<()> {
        let cf = self.cf(collection)?;
        self.db.put_cf(&cf, doc_key(id), serde_json::to_vec(doc)?)?;
        self.db.put_cf(&cf, hash_key(hash), id.as_bytes())?;
        Ok(())
    }

    pub fn hash_exists(&self, collection: &str, hash: &str) -> LedgerResult<bool> {
        let cf = self.cf(collection)?;
        Ok(self.db.get_cf(&cf, hash_key(hash))?.is_some())
    }

    pub fn iter_docs<T: DeserializeOwned>(&self, collection: &str) -> LedgerResult<Vec<T>> {
        let cf = self.cf(collection)?;
        let mut docs = Vec::new();
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = entry?;
            if key.starts_with(DOC_PREFIX) {
                docs.push(serde_json::from_slice(&value)?);
            }
        }
        Ok(docs)
    }

    // Transactions.

    pub fn put_transaction(&self, tx: &Transaction) -> LedgerResult<()> {
        self.ensure_ledger(&tx.ledger)?;
        self.put_doc_with_hash(&tx.ledger, &tx.id, &tx.hash, tx)
    }

    pub fn get_transaction(&self, ledger: &str, id: &str) -> LedgerResult<Option<Transaction>> {
        if !self.ledgers.read().contains(ledger) {
            return Ok(None);
        }
        self.get_doc(ledger, id)
    }

    pub fn transaction_hash_exists(&self, ledger: &str, hash: &str) -> LedgerResult<bool> {
        if !self.ledgers.read().contains(ledger) {
            return Ok(false);
        }
        self.hash_exists(ledger, hash)
    }

    /// Looks a transaction up across every ledger bucket.
    pub fn find_transaction(&self, id: &str) -> LedgerResult<Option<Transaction>> {
        for ledger in self.ledger_names() {
            if let Some(tx) = self.get_doc::<Transaction>(&ledger, id)? {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    pub fn modify_transaction<F>(&self, ledger: &str, id: &str, mutate: F) -> LedgerResult<bool>
    where
        F: FnOnce(&mut Transaction),
    {
        self.modify_doc(ledger, id, mutate)
    }

    // Blocks. Block documents are keyed by id; `number` and `height` have
    // unique secondary indexes.

    pub fn get_block(&self, id: &str) -> LedgerResult<Option<Block>> {
        self.get_doc(COLLECTION_BLOCKS, id)
    }

    pub fn create_block(&self, block: &Block) -> LedgerResult<()> {
        let _guard = self.write_lock.lock();
        self.put_doc(COLLECTION_BLOCKS, &block.id, block)?;
        let numbers = self.cf(CF_BLOCK_NUMBERS)?;
        self.db.put_cf(&numbers, block.number.to_be_bytes(), block.id.as_bytes())?;
        let heights = self.cf(CF_BLOCK_HEIGHTS)?;
        self.db.put_cf(&heights, block.height.to_be_bytes(), block.id.as_bytes())?;
        Ok(())
    }

    pub fn block_number_exists(&self, number: i64) -> LedgerResult<bool> {
        let numbers = self.cf(CF_BLOCK_NUMBERS)?;
        Ok(self.db.get_cf(&numbers, number.to_be_bytes())?.is_some())
    }

    pub fn find_block_by_number(&self, number: i64) -> LedgerResult<Option<Block>> {
        let numbers = self.cf(CF_BLOCK_NUMBERS)?;
        match self.db.get_cf(&numbers, number.to_be_bytes())? {
            Some(id) => self.get_block(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn find_block_by_height(&self, height: u64) -> LedgerResult<Option<Block>> {
        let heights = self.cf(CF_BLOCK_HEIGHTS)?;
        match self.db.get_cf(&heights, height.to_be_bytes())? {
            Some(id) => self.get_block(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Pushes a transaction reference into the open block for `number`.
    /// Returns `false` when no open block with that number exists — the
    /// caller then creates one and retries.
    pub fn append_to_open_block(&self, number: i64, entry: &BlockTransactionRef) -> LedgerResult<bool> {
        let _guard = self.write_lock.lock();
        let Some(mut block) = self.find_block_by_number(number)? else {
            return Ok(false);
        };
        if block.closed {
            return Ok(false);
        }
        block.transactions.push(entry.clone());
        self.put_doc(COLLECTION_BLOCKS, &block.id, &block)?;
        Ok(true)
    }

    pub fn modify_block<F>(&self, id: &str, mutate: F) -> LedgerResult<bool>
    where
        F: FnOnce(&mut Block),
    {
        self.modify_doc(COLLECTION_BLOCKS, id, mutate)
    }

    pub fn find_block_by_transaction(&self, tx_id: &str) -> LedgerResult<Option<Block>> {
        for block in self.iter_docs::<Block>(COLLECTION_BLOCKS)? {
            if block.transactions.iter().any(|entry| entry.id == tx_id) {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::types::TransactionType;
    use tempfile::tempdir;

    fn sample_transaction(ledger: &str, id: &str, hash: &str) -> Transaction {
        Transaction {
            id: id.into(),
            previous_id: None,
            transaction_type: TransactionType::Transfer,
            from: "a".into(),
            to: "b".into(),
            element: "e".into(),
            volume: Amount::from_u64(5),
            nonce: 1,
            hash: hash.into(),
            public_key: "pk".into(),
            signature: "sig".into(),
            timestamp: 1,
            shard: 1,
            ledger: ledger.into(),
            block: None,
            confirmed: false,
            privacy: false,
            version: 1,
            element_tax: Amount::zero(),
            network_tax: Amount::zero(),
            total_tax: Amount::zero(),
            total: Amount::from_u64(5),
            link: None,
            metadata: None,
        }
    }

    #[test]
    fn ledger_buckets_are_created_on_demand() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let tx = sample_transaction("ledger_2810", "t1", "h1");
        store.put_transaction(&tx).unwrap();
        assert!(store.transaction_hash_exists("ledger_2810", "h1").unwrap());
        assert!(!store.transaction_hash_exists("ledger_2811", "h1").unwrap());
        assert_eq!(store.ledger_names(), vec!["ledger_2810".to_string()]);
        let found = store.find_transaction("t1").unwrap().unwrap();
        assert_eq!(found.ledger, "ledger_2810");
    }

    #[test]
    fn ledger_buckets_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store
                .put_transaction(&sample_transaction("ledger_77", "t1", "h1"))
                .unwrap();
        }
        let store = Store::open(dir.path()).unwrap();
        assert!(store.transaction_hash_exists("ledger_77", "h1").unwrap());
    }

    #[test]
    fn conditional_append_requires_open_block() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let entry = BlockTransactionRef {
            id: "t1".into(),
            ledger: "ledger_1".into(),
            element: "e".into(),
            tax: Amount::zero(),
            privacy: false,
            volume: None,
        };
        assert!(!store.append_to_open_block(10, &entry).unwrap());

        let block = Block::open("b1".into(), None, 10, 0, 1);
        store.create_block(&block).unwrap();
        assert!(store.append_to_open_block(10, &entry).unwrap());

        store
            .modify_block("b1", |block| block.closed = true)
            .unwrap();
        assert!(!store.append_to_open_block(10, &entry).unwrap());
        let stored = store.get_block("b1").unwrap().unwrap();
        assert_eq!(stored.transactions.len(), 1);
    }

    #[test]
    fn block_indexes_resolve_number_and_height() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .create_block(&Block::open("b1".into(), None, 42, 7, 1))
            .unwrap();
        assert!(store.block_number_exists(42).unwrap());
        assert!(!store.block_number_exists(43).unwrap());
        assert_eq!(store.find_block_by_number(42).unwrap().unwrap().id, "b1");
        assert_eq!(store.find_block_by_height(7).unwrap().unwrap().id, "b1");
    }

    #[test]
    fn find_block_by_transaction_scans_contents() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut block = Block::open("b1".into(), None, 1, 0, 1);
        block.transactions.push(BlockTransactionRef {
            id: "t9".into(),
            ledger: "ledger_1".into(),
            element: "e".into(),
            tax: Amount::zero(),
            privacy: false,
            volume: None,
        });
        store.create_block(&block).unwrap();
        assert_eq!(
            store.find_block_by_transaction("t9").unwrap().unwrap().id,
            "b1"
        );
        assert!(store.find_block_by_transaction("t0").unwrap().is_none());
    }
}
