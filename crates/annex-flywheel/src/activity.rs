// crates/annex-flywheel/src/activity.rs
//
// Activity balances the flywheel distributes against.
//
// The lending market owns these numbers; the flywheel only reads them through
// `ActivitySource`. `ActivityBook` is the in-process replica used by the
// comptroller: per market, each account's activity amount (minted VAI for the
// mint market, borrow or supply balances for the others) and their total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use annex_core::{AccountId, MarketId};

use crate::error::FlywheelError;

/// Read-only view of activity amounts.
pub trait ActivitySource {
    /// The denominator of a market's index update (e.g. VAI total supply).
    fn total_activity(&self, market: &MarketId) -> u128;

    /// One account's current activity amount on a market.
    fn account_activity(&self, market: &MarketId, account: &AccountId) -> u128;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketBalances {
    #[serde(with = "crate::serde_u128")]
    pub total: u128,
    #[serde(with = "crate::serde_u128::map")]
    pub balances: BTreeMap<AccountId, u128>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBook {
    markets: BTreeMap<MarketId, MarketBalances>,
}

impl ActivityBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market(&self, market: &MarketId) -> Option<&MarketBalances> {
        self.markets.get(market)
    }

    /// Grow `account`'s activity (mint, borrow, supply).
    pub fn increase(
        &mut self,
        market: &MarketId,
        account: AccountId,
        amount: u128,
    ) -> Result<(), FlywheelError> {
        let book = self.markets.entry(market.clone()).or_default();
        let balance = book.balances.get(&account).copied().unwrap_or(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(FlywheelError::ArithmeticOverflow("activity balance"))?;
        let new_total = book
            .total
            .checked_add(amount)
            .ok_or(FlywheelError::ArithmeticOverflow("activity total"))?;
        book.balances.insert(account, new_balance);
        book.total = new_total;
        Ok(())
    }

    /// Shrink `account`'s activity (redeem, repay, withdraw).
    pub fn decrease(
        &mut self,
        market: &MarketId,
        account: AccountId,
        amount: u128,
    ) -> Result<(), FlywheelError> {
        let available = self.account_activity(market, &account);
        if amount > available {
            return Err(FlywheelError::InsufficientBalance {
                account,
                requested: amount,
                available,
            });
        }
        // `amount <= available <= total`, so neither subtraction can wrap.
        if let Some(book) = self.markets.get_mut(market) {
            let remaining = available - amount;
            if remaining == 0 {
                book.balances.remove(&account);
            } else {
                book.balances.insert(account, remaining);
            }
            book.total -= amount;
        }
        Ok(())
    }

    /// Move activity between accounts. The total is unchanged.
    pub fn transfer(
        &mut self,
        market: &MarketId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), FlywheelError> {
        self.decrease(market, from, amount)?;
        self.increase(market, to, amount)
    }
}

impl ActivitySource for ActivityBook {
    fn total_activity(&self, market: &MarketId) -> u128 {
        self.markets.get(market).map(|b| b.total).unwrap_or(0)
    }

    fn account_activity(&self, market: &MarketId, account: &AccountId) -> u128 {
        self.markets
            .get(market)
            .and_then(|b| b.balances.get(account))
            .copied()
            .unwrap_or(0)
    }
}
