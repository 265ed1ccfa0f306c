// crates/annex-flywheel/src/events.rs
//
// Events emitted by committed transactions.
//
// `DistributedMinterReward` and `RateChanged` are the reconciliation contract
// for off-chain accounting; their field sets do not change.

use serde::{Deserialize, Serialize};

use annex_core::{AccountId, ActivityKind, MarketId};

use crate::exp::{Double, Exp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlywheelEvent {
    /// An account was settled against a market index.
    DistributedMinterReward {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount_delta: u128,
        resulting_index: Double,
    },
    /// The emission rate was replaced by the admin.
    RateChanged { old_rate: Exp, new_rate: Exp },
    /// Accrued rewards were transferred out of the reward pool.
    RewardGranted {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
    },
    /// Payout skipped because the reward pool could not cover it.
    RewardDeferred {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        owed: u128,
        #[serde(with = "crate::serde_u128")]
        available: u128,
    },
    MarketListed { market: MarketId, kind: ActivityKind },
    MarketDelisted { market: MarketId },
    AccruedOverridden {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
    },
    AdminChanged { old_admin: AccountId, new_admin: AccountId },
    TreasuryWithdrawn {
        to: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
    },
    OwnershipTransferred { previous_owner: AccountId, new_owner: AccountId },
}

impl FlywheelEvent {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            FlywheelEvent::DistributedMinterReward { .. } => "DistributedMinterReward",
            FlywheelEvent::RateChanged { .. } => "RateChanged",
            FlywheelEvent::RewardGranted { .. } => "RewardGranted",
            FlywheelEvent::RewardDeferred { .. } => "RewardDeferred",
            FlywheelEvent::MarketListed { .. } => "MarketListed",
            FlywheelEvent::MarketDelisted { .. } => "MarketDelisted",
            FlywheelEvent::AccruedOverridden { .. } => "AccruedOverridden",
            FlywheelEvent::AdminChanged { .. } => "AdminChanged",
            FlywheelEvent::TreasuryWithdrawn { .. } => "TreasuryWithdrawn",
            FlywheelEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}
