// crates/annex-store/src/traits.rs

use async_trait::async_trait;

use annex_core::AnnexError;
use annex_flywheel::{LedgerSnapshot, Receipt};

use crate::receipt::StoredReceipt;

/// Persistent storage for flywheel state.
///
/// Implemented by `RocksStore` (daemon) and `MemoryStore` (tests).
#[async_trait]
pub trait FlywheelStore: Send + Sync {
    /// Replace the latest snapshot.
    async fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), AnnexError>;

    /// The latest snapshot, if one was ever saved.
    async fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, AnnexError>;

    /// Append a receipt to the log, assigning it the next sequence number.
    async fn append_receipt(&self, receipt: &Receipt) -> Result<StoredReceipt, AnnexError>;

    /// Receipts with `seq >= from`, in sequence order, at most `limit` of them.
    async fn list_receipts(&self, from: u64, limit: usize)
        -> Result<Vec<StoredReceipt>, AnnexError>;

    /// Record a committed transaction: its receipt and the state it produced.
    ///
    /// Backends that can write both atomically should override this.
    async fn commit(
        &self,
        receipt: &Receipt,
        snapshot: &LedgerSnapshot,
    ) -> Result<StoredReceipt, AnnexError> {
        let stored = self.append_receipt(receipt).await?;
        self.save_snapshot(snapshot).await?;
        Ok(stored)
    }
}
