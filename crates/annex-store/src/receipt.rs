// crates/annex-store/src/receipt.rs
//
// Receipt log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use annex_core::BlockNumber;
use annex_flywheel::{FlywheelEvent, Receipt};

/// A committed receipt as written to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReceipt {
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub id: Uuid,
    pub block: BlockNumber,
    pub op: String,
    pub applied_at: DateTime<Utc>,
    pub events: Vec<FlywheelEvent>,
}

impl StoredReceipt {
    pub fn new(seq: u64, receipt: &Receipt) -> Self {
        Self {
            seq,
            id: Uuid::now_v7(),
            block: receipt.block,
            op: receipt.op.clone(),
            applied_at: Utc::now(),
            events: receipt.events.clone(),
        }
    }

    /// Strip the log metadata back off.
    pub fn receipt(&self) -> Receipt {
        Receipt {
            block: self.block,
            op: self.op.clone(),
            events: self.events.clone(),
        }
    }
}
