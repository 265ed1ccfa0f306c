// crates/annex-flywheel/src/token.rs
//
// ANN (Annex) reward token balances.
//
// ANN has 18 decimals; every amount is held in its smallest unit
// (1 ANN = 10^18). `TokenLedger` is an ERC-20-like balance table, and
// `RewardVault` is the narrow view the claim path needs of it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use annex_core::AccountId;

use crate::error::FlywheelError;
use crate::exp::EXP_SCALE;

/// Balance check and transfer: all the claim path knows about the token.
pub trait RewardVault {
    fn balance_of(&self, account: &AccountId) -> u128;

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u128)
        -> Result<(), FlywheelError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    #[serde(with = "crate::serde_u128::map")]
    balances: BTreeMap<AccountId, u128>,
    #[serde(with = "crate::serde_u128")]
    total_supply: u128,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Create `amount` new tokens in `to`'s balance.
    pub fn issue(&mut self, to: AccountId, amount: u128) -> Result<(), FlywheelError> {
        let total = self
            .total_supply
            .checked_add(amount)
            .ok_or(FlywheelError::ArithmeticOverflow("token supply"))?;
        // Bounded by total_supply, which did not overflow.
        *self.balances.entry(to).or_insert(0) += amount;
        self.total_supply = total;
        Ok(())
    }
}

impl RewardVault for TokenLedger {
    fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), FlywheelError> {
        let available = self.balance_of(&from);
        if amount > available {
            return Err(FlywheelError::InsufficientBalance {
                account: from,
                requested: amount,
                available,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, remaining);
        }
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

/// Display wrapper rendering a raw amount as whole ANN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ann(pub u128);

impl fmt::Display for Ann {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / EXP_SCALE;
        let frac = self.0 % EXP_SCALE;
        if frac == 0 {
            write!(f, "{} ANN", whole)
        } else {
            // Up to 18 decimal places, trailing zeros trimmed.
            let frac_str = format!("{:018}", frac);
            write!(f, "{}.{} ANN", whole, frac_str.trim_end_matches('0'))
        }
    }
}
