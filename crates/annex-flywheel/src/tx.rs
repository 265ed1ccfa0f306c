// crates/annex-flywheel/src/tx.rs
//
// Transactions accepted by the comptroller and the receipts they produce.
//
// JSON shape: `{"op": "mint", "account": "0x..", "amount": "1000"}`.
// Amounts may be written as strings, or as integers up to u64::MAX; rates
// and indices are decimal strings.

use serde::{Deserialize, Serialize};

use annex_core::{AccountId, BlockNumber, MarketId};

use crate::admin::MarketListing;
use crate::claim::ClaimRequest;
use crate::events::FlywheelEvent;
use crate::exp::Exp;

fn vai_mint() -> MarketId {
    MarketId::vai_mint()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transaction {
    /// Let blocks elapse. Advances every eligible market index to the
    /// transaction height and nothing else.
    AdvanceBlock,
    /// Grow an account's activity on a market (VAI mint by default).
    Mint {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
        #[serde(default = "vai_mint")]
        market: MarketId,
    },
    /// Shrink an account's activity on a market.
    Redeem {
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
        #[serde(default = "vai_mint")]
        market: MarketId,
    },
    /// Move activity between two accounts.
    Transfer {
        from: AccountId,
        to: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
        #[serde(default = "vai_mint")]
        market: MarketId,
    },
    Claim(ClaimRequest),
    SetEmissionRate { caller: AccountId, rate: Exp },
    AddMarket {
        caller: AccountId,
        #[serde(flatten)]
        listing: MarketListing,
    },
    SetEligibleMarkets {
        caller: AccountId,
        markets: Vec<MarketListing>,
    },
    SetAccrued {
        caller: AccountId,
        account: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
    },
    TransferAdmin { caller: AccountId, new_admin: AccountId },
    /// Move ANN from `from` into the reward pool.
    FundRewardPool {
        from: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
    },
    TreasuryWithdraw {
        caller: AccountId,
        #[serde(with = "crate::serde_u128")]
        amount: u128,
        to: AccountId,
    },
    TransferTreasuryOwnership { caller: AccountId, new_owner: AccountId },
}

impl Transaction {
    /// Operation name, matching the JSON `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Transaction::AdvanceBlock => "advance_block",
            Transaction::Mint { .. } => "mint",
            Transaction::Redeem { .. } => "redeem",
            Transaction::Transfer { .. } => "transfer",
            Transaction::Claim(_) => "claim",
            Transaction::SetEmissionRate { .. } => "set_emission_rate",
            Transaction::AddMarket { .. } => "add_market",
            Transaction::SetEligibleMarkets { .. } => "set_eligible_markets",
            Transaction::SetAccrued { .. } => "set_accrued",
            Transaction::TransferAdmin { .. } => "transfer_admin",
            Transaction::FundRewardPool { .. } => "fund_reward_pool",
            Transaction::TreasuryWithdraw { .. } => "treasury_withdraw",
            Transaction::TransferTreasuryOwnership { .. } => "transfer_treasury_ownership",
        }
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub block: BlockNumber,
    pub op: String,
    pub events: Vec<FlywheelEvent>,
}

impl Receipt {
    /// Settlement events for `account`, in emission order.
    pub fn distributions_for(&self, account: &AccountId) -> Vec<&FlywheelEvent> {
        self.events
            .iter()
            .filter(|e| {
                matches!(e, FlywheelEvent::DistributedMinterReward { account: a, .. } if a == account)
            })
            .collect()
    }
}
