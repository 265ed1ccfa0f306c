// crates/annex-store/src/memory.rs
//
// In-memory FlywheelStore for tests and dry runs. Nothing survives the
// process.

use async_trait::async_trait;
use tokio::sync::RwLock;

use annex_core::AnnexError;
use annex_flywheel::{LedgerSnapshot, Receipt};

use crate::receipt::StoredReceipt;
use crate::traits::FlywheelStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<LedgerSnapshot>>,
    receipts: RwLock<Vec<StoredReceipt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn receipt_count(&self) -> usize {
        self.receipts.read().await.len()
    }
}

#[async_trait]
impl FlywheelStore for MemoryStore {
    async fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), AnnexError> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, AnnexError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn append_receipt(&self, receipt: &Receipt) -> Result<StoredReceipt, AnnexError> {
        let mut receipts = self.receipts.write().await;
        let stored = StoredReceipt::new(receipts.len() as u64, receipt);
        receipts.push(stored.clone());
        Ok(stored)
    }

    async fn list_receipts(
        &self,
        from: u64,
        limit: usize,
    ) -> Result<Vec<StoredReceipt>, AnnexError> {
        let receipts = self.receipts.read().await;
        Ok(receipts
            .iter()
            .skip(from as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}
