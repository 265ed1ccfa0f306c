// crates/annex-store/src/rocks.rs
//
// RocksDB-backed persistent storage for flywheel state.
//
// Key format:
//   - Snapshot: `snapshot:latest`      -> JSON-serialized LedgerSnapshot
//   - Receipts: `receipt:{seq:020}`    -> JSON-serialized StoredReceipt
//
// Sequence numbers are zero-padded so lexicographic key order is log order.
// The store has a single writer; a sequence number is consumed only once its
// write lands, so a failed write leaves no gap in the log.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};
use tracing::debug;

use annex_core::AnnexError;
use annex_flywheel::{LedgerSnapshot, Receipt};

use crate::receipt::StoredReceipt;
use crate::traits::FlywheelStore;

const SNAPSHOT_KEY: &[u8] = b"snapshot:latest";
const RECEIPT_PREFIX: &[u8] = b"receipt:";
/// First byte after ':' in ASCII; seeking here in reverse lands on the last
/// receipt key.
const RECEIPT_UPPER: &[u8] = b"receipt;";

/// RocksDB wrapper implementing the `FlywheelStore` trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    next_seq: AtomicU64,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist. The receipt
    /// sequence resumes after the last receipt on disk.
    pub fn open(path: &str) -> Result<Self, AnnexError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)
            .map_err(|e| AnnexError::Storage(format!("Failed to open RocksDB at {}: {}", path, e)))?;
        Self::resume(db, path)
    }

    /// Open an existing database without taking the write lock, so it can be
    /// read while a daemon is serving from it. Every write fails.
    pub fn open_read_only(path: &str) -> Result<Self, AnnexError> {
        let db = DBWithThreadMode::<MultiThreaded>::open_for_read_only(
            &Options::default(),
            path,
            false,
        )
        .map_err(|e| AnnexError::Storage(format!("Failed to open RocksDB at {}: {}", path, e)))?;
        Self::resume(db, path)
    }

    fn resume(db: DBWithThreadMode<MultiThreaded>, path: &str) -> Result<Self, AnnexError> {
        let store = Self {
            db,
            next_seq: AtomicU64::new(0),
        };
        let next = match store.last_receipt_seq()? {
            Some(seq) => seq + 1,
            None => 0,
        };
        store.next_seq.store(next, Ordering::SeqCst);
        debug!(path, next_seq = next, "receipt store opened");
        Ok(store)
    }

    /// Build the key for a receipt: `receipt:{seq:020}`.
    fn receipt_key(seq: u64) -> Vec<u8> {
        format!("receipt:{:020}", seq).into_bytes()
    }

    /// Put raw bytes into RocksDB, mapping errors to AnnexError::Storage.
    fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), AnnexError> {
        self.db
            .put(key, value)
            .map_err(|e| AnnexError::Storage(format!("RocksDB put failed: {}", e)))
    }

    /// Get raw bytes from RocksDB, mapping errors to AnnexError::Storage.
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AnnexError> {
        self.db
            .get(key)
            .map_err(|e| AnnexError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn last_receipt_seq(&self) -> Result<Option<u64>, AnnexError> {
        let mut iter = self
            .db
            .iterator(IteratorMode::From(RECEIPT_UPPER, Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, _) = item
                    .map_err(|e| AnnexError::Storage(format!("RocksDB iteration error: {}", e)))?;
                if !key.starts_with(RECEIPT_PREFIX) {
                    return Ok(None);
                }
                Ok(Some(parse_seq(&key)?))
            }
            None => Ok(None),
        }
    }

    /// Number of receipts written so far.
    pub fn receipt_count(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlywheelStore for RocksStore {
    async fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), AnnexError> {
        self.put_raw(SNAPSHOT_KEY, &snapshot.to_bytes()?)
    }

    async fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, AnnexError> {
        match self.get_raw(SNAPSHOT_KEY)? {
            Some(bytes) => Ok(Some(LedgerSnapshot::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn append_receipt(&self, receipt: &Receipt) -> Result<StoredReceipt, AnnexError> {
        let seq = self.next_seq.load(Ordering::SeqCst);
        let stored = StoredReceipt::new(seq, receipt);
        self.put_raw(&Self::receipt_key(seq), &serde_json::to_vec(&stored)?)?;
        self.next_seq.store(seq + 1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn list_receipts(
        &self,
        from: u64,
        limit: usize,
    ) -> Result<Vec<StoredReceipt>, AnnexError> {
        let start = Self::receipt_key(from);
        let mut receipts: Vec<StoredReceipt> = Vec::new();

        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_slice(), Direction::Forward));
        for item in iter {
            if receipts.len() >= limit {
                break;
            }
            let (key, value) = item
                .map_err(|e| AnnexError::Storage(format!("RocksDB iteration error: {}", e)))?;

            // Stop when the prefix no longer matches.
            if !key.starts_with(RECEIPT_PREFIX) {
                break;
            }
            receipts.push(serde_json::from_slice(&value)?);
        }

        Ok(receipts)
    }

    /// Write the receipt and the snapshot in one batch.
    async fn commit(
        &self,
        receipt: &Receipt,
        snapshot: &LedgerSnapshot,
    ) -> Result<StoredReceipt, AnnexError> {
        let seq = self.next_seq.load(Ordering::SeqCst);
        let stored = StoredReceipt::new(seq, receipt);

        let mut batch = WriteBatch::default();
        batch.put(Self::receipt_key(seq), serde_json::to_vec(&stored)?);
        batch.put(SNAPSHOT_KEY, snapshot.to_bytes()?);
        self.db
            .write(batch)
            .map_err(|e| AnnexError::Storage(format!("RocksDB batch write failed: {}", e)))?;
        self.next_seq.store(seq + 1, Ordering::SeqCst);

        debug!(seq, block = stored.block, op = %stored.op, "receipt committed");
        Ok(stored)
    }
}

/// Recover the sequence number from a `receipt:{seq:020}` key.
fn parse_seq(key: &[u8]) -> Result<u64, AnnexError> {
    let digits = std::str::from_utf8(&key[RECEIPT_PREFIX.len()..])
        .map_err(|e| AnnexError::Storage(format!("Malformed receipt key: {}", e)))?;
    digits
        .parse()
        .map_err(|e| AnnexError::Storage(format!("Malformed receipt key {:?}: {}", digits, e)))
}
