// crates/annex-flywheel/src/snapshot.rs
//
// LedgerSnapshot: the complete comptroller state in serialized form.
//
// Every map in the state is a BTreeMap, so the JSON encoding is canonical and
// two replicas that applied the same transactions produce the same digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use annex_core::{AnnexError, BlockNumber};

use crate::comptroller::Comptroller;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub format_version: u32,
    pub comptroller: Comptroller,
}

impl LedgerSnapshot {
    pub fn capture(comptroller: &Comptroller) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            comptroller: comptroller.clone(),
        }
    }

    pub fn height(&self) -> BlockNumber {
        self.comptroller.height()
    }

    /// Hex SHA-256 of the canonical JSON encoding.
    pub fn digest(&self) -> Result<String, AnnexError> {
        let bytes = self.to_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AnnexError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AnnexError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(AnnexError::InvalidState(format!(
                "unsupported snapshot format {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Hand back the comptroller to resume from.
    pub fn restore(self) -> Comptroller {
        self.comptroller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex_core::{AccountId, ActivityKind, MarketId};

    use crate::admin::MarketListing;
    use crate::comptroller::{Allocation, GenesisConfig};
    use crate::exp::{Exp, EXP_SCALE};
    use crate::tx::Transaction;

    fn build() -> Comptroller {
        let admin = AccountId::repeat_byte(0xad);
        let pool = AccountId::repeat_byte(0xcc);
        let mut c = Comptroller::genesis(GenesisConfig {
            admin,
            emission_rate: Exp::from_mantissa(EXP_SCALE / 2),
            reward_pool: pool,
            treasury_account: AccountId::repeat_byte(0x7e),
            treasury_owner: admin,
            markets: vec![MarketListing {
                id: MarketId::vai_mint(),
                kind: ActivityKind::Mint,
            }],
            allocations: vec![Allocation {
                account: pool,
                amount: 50 * EXP_SCALE,
            }],
            start_block: 0,
        })
        .unwrap();
        c.apply(
            0,
            Transaction::Mint {
                account: AccountId::repeat_byte(1),
                amount: 3 * EXP_SCALE,
                market: MarketId::vai_mint(),
            },
        )
        .unwrap();
        c.apply(7, Transaction::AdvanceBlock).unwrap();
        c
    }

    #[test]
    fn test_snapshot_restores_identical_state() {
        let c = build();
        let snapshot = LedgerSnapshot::capture(&c);
        let bytes = snapshot.to_bytes().unwrap();
        let restored = LedgerSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored.height(), 7);
        assert_eq!(restored.restore(), c);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = LedgerSnapshot::capture(&build()).digest().unwrap();
        let b = LedgerSnapshot::capture(&build()).digest().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_state() {
        let mut c = build();
        let before = LedgerSnapshot::capture(&c).digest().unwrap();
        c.apply(8, Transaction::AdvanceBlock).unwrap();
        let after = LedgerSnapshot::capture(&c).digest().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut snapshot = LedgerSnapshot::capture(&build());
        snapshot.format_version = 99;
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let err = LedgerSnapshot::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot format"));
    }
}
