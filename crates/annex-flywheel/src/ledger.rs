// crates/annex-flywheel/src/ledger.rs
//
// RewardLedger: the single owner of all distribution state.
//
//   markets:     market -> { kind, eligible, index, block }
//   checkpoints: market -> account -> index last settled at
//   accrued:     account -> unpaid ANN (1e18 scale)
//
// Reads are public. Writes are crate-private and go through the accrual
// engine, the claim processor, and the admin gate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use annex_core::{AccountId, ActivityKind, BlockNumber, MarketId};

use crate::error::FlywheelError;
use crate::exp::Double;

/// Global distribution state of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRewardState {
    /// Cumulative reward per unit of activity since genesis.
    pub index: Double,
    /// Block the index was last advanced at.
    pub block: BlockNumber,
}

impl MarketRewardState {
    /// Fresh state: index 1.0 at the given block.
    pub fn initial(block: BlockNumber) -> Self {
        Self {
            index: Double::one(),
            block,
        }
    }
}

/// A market known to the ledger. Delisted markets keep their state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub kind: ActivityKind,
    pub eligible: bool,
    pub state: MarketRewardState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedger {
    markets: BTreeMap<MarketId, MarketEntry>,
    checkpoints: BTreeMap<MarketId, BTreeMap<AccountId, Double>>,
    #[serde(with = "crate::serde_u128::map")]
    accrued: BTreeMap<AccountId, u128>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market(&self, market: &MarketId) -> Option<&MarketEntry> {
        self.markets.get(market)
    }

    pub fn market_state(&self, market: &MarketId) -> Result<MarketRewardState, FlywheelError> {
        self.markets
            .get(market)
            .map(|entry| entry.state)
            .ok_or_else(|| FlywheelError::UnknownMarket(market.clone()))
    }

    /// Every market ever listed, eligible or not, in id order.
    pub fn markets(&self) -> impl Iterator<Item = (&MarketId, &MarketEntry)> {
        self.markets.iter()
    }

    /// Markets currently participating in distribution, in id order.
    pub fn eligible_markets(&self) -> impl Iterator<Item = (&MarketId, &MarketEntry)> {
        self.markets.iter().filter(|(_, entry)| entry.eligible)
    }

    /// The index `account` was last settled at, if it has ever been settled.
    pub fn checkpoint(&self, market: &MarketId, account: &AccountId) -> Option<Double> {
        self.checkpoints
            .get(market)
            .and_then(|per_account| per_account.get(account))
            .copied()
    }

    /// Unpaid ANN owed to `account`.
    pub fn accrued(&self, account: &AccountId) -> u128 {
        self.accrued.get(account).copied().unwrap_or(0)
    }

    /// Sum of all unpaid ANN.
    pub fn total_accrued(&self) -> Result<u128, FlywheelError> {
        self.accrued.values().try_fold(0u128, |acc, v| {
            acc.checked_add(*v)
                .ok_or(FlywheelError::ArithmeticOverflow("accrued total"))
        })
    }

    /// List a market, or re-enable a delisted one. A new market starts at
    /// index 1.0 from `block`. A relisted market keeps its index but resumes
    /// from `block`, so the delisted window emits nothing. Returns true when
    /// the market was not eligible before.
    pub(crate) fn list_market(
        &mut self,
        market: MarketId,
        kind: ActivityKind,
        block: BlockNumber,
    ) -> bool {
        match self.markets.get_mut(&market) {
            Some(entry) => {
                if entry.eligible {
                    return false;
                }
                entry.eligible = true;
                entry.state.block = entry.state.block.max(block);
                true
            }
            None => {
                self.markets.insert(
                    market,
                    MarketEntry {
                        kind,
                        eligible: true,
                        state: MarketRewardState::initial(block),
                    },
                );
                true
            }
        }
    }

    /// Stop distributing on a market. Returns true if it was eligible.
    pub(crate) fn delist_market(&mut self, market: &MarketId) -> bool {
        match self.markets.get_mut(market) {
            Some(entry) if entry.eligible => {
                entry.eligible = false;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_market_state(
        &mut self,
        market: &MarketId,
        state: MarketRewardState,
    ) -> Result<(), FlywheelError> {
        let entry = self
            .markets
            .get_mut(market)
            .ok_or_else(|| FlywheelError::UnknownMarket(market.clone()))?;
        entry.state = state;
        Ok(())
    }

    pub(crate) fn set_checkpoint(&mut self, market: &MarketId, account: AccountId, index: Double) {
        self.checkpoints
            .entry(market.clone())
            .or_default()
            .insert(account, index);
    }

    pub(crate) fn set_accrued(&mut self, account: AccountId, amount: u128) {
        if amount == 0 {
            self.accrued.remove(&account);
        } else {
            self.accrued.insert(account, amount);
        }
    }
}
