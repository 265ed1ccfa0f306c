// crates/annex-flywheel/src/treasury.rs
//
// Protocol treasury.
//
// The treasury is an account on the token ledger plus an owner. Only the
// owner may withdraw, and never more than the treasury holds. It has no
// knowledge of reward accrual.

use serde::{Deserialize, Serialize};
use tracing::info;

use annex_core::AccountId;

use crate::error::FlywheelError;
use crate::events::FlywheelEvent;
use crate::token::{Ann, RewardVault};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Account on the token ledger holding the treasury's funds.
    account: AccountId,
    owner: AccountId,
}

impl Treasury {
    pub fn new(account: AccountId, owner: AccountId) -> Self {
        Self { account, owner }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    /// Current balance held by the treasury.
    pub fn balance(&self, token: &dyn RewardVault) -> u128 {
        token.balance_of(&self.account)
    }

    fn ensure_owner(&self, caller: AccountId) -> Result<(), FlywheelError> {
        if caller != self.owner {
            return Err(FlywheelError::NotOwner { caller });
        }
        Ok(())
    }

    /// Send `amount` from the treasury to `to`.
    ///
    /// # Errors
    /// `NotOwner` for any caller but the owner; `WithdrawExceedsBalance` when
    /// `amount` is larger than the treasury balance. Withdrawing the exact
    /// balance is allowed.
    pub fn withdraw(
        &self,
        token: &mut dyn RewardVault,
        caller: AccountId,
        amount: u128,
        to: AccountId,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_owner(caller)?;
        let balance = token.balance_of(&self.account);
        if amount > balance {
            return Err(FlywheelError::WithdrawExceedsBalance {
                requested: amount,
                balance,
            });
        }
        token.transfer(self.account, to, amount)?;
        info!(to = %to, amount = %Ann(amount), "treasury withdrawal");
        events.push(FlywheelEvent::TreasuryWithdrawn { to, amount });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: AccountId,
        new_owner: AccountId,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_owner(caller)?;
        let previous_owner = self.owner;
        self.owner = new_owner;
        events.push(FlywheelEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::EXP_SCALE;
    use crate::token::TokenLedger;

    const TRANSFER_AMOUNT: u128 = 1000 * EXP_SCALE;

    fn root() -> AccountId {
        AccountId::repeat_byte(0x01)
    }

    fn treasury_account() -> AccountId {
        AccountId::repeat_byte(0x7e)
    }

    fn setup() -> (Treasury, TokenLedger) {
        let mut token = TokenLedger::new();
        token.issue(treasury_account(), TRANSFER_AMOUNT).unwrap();
        (Treasury::new(treasury_account(), root()), token)
    }

    #[test]
    fn test_owner_is_deployer() {
        let (treasury, token) = setup();
        assert_eq!(treasury.owner(), root());
        assert_eq!(treasury.balance(&token), TRANSFER_AMOUNT);
    }

    #[test]
    fn test_change_owner() {
        let (mut treasury, _) = setup();
        let next = AccountId::repeat_byte(0x02);
        treasury
            .transfer_ownership(root(), next, &mut Vec::new())
            .unwrap();
        assert_eq!(treasury.owner(), next);
        // The old owner has lost the capability.
        assert!(treasury
            .transfer_ownership(root(), root(), &mut Vec::new())
            .is_err());
    }

    #[test]
    fn test_wrong_owner() {
        let (treasury, mut token) = setup();
        let err = treasury
            .withdraw(
                &mut token,
                AccountId::repeat_byte(0x03),
                TRANSFER_AMOUNT,
                AccountId::repeat_byte(0x02),
                &mut Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "caller is not the owner");
        assert_eq!(treasury.balance(&token), TRANSFER_AMOUNT);
    }

    #[test]
    fn test_wrong_withdraw_amount() {
        let (treasury, mut token) = setup();
        let err = treasury
            .withdraw(
                &mut token,
                root(),
                1001 * EXP_SCALE,
                AccountId::repeat_byte(0x02),
                &mut Vec::new(),
            )
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("withdraw amount should be less than balance"));
        assert_eq!(treasury.balance(&token), TRANSFER_AMOUNT);
    }

    #[test]
    fn test_withdraw_full_balance() {
        let (treasury, mut token) = setup();
        let recipient = AccountId::repeat_byte(0x02);
        let mut events = Vec::new();
        treasury
            .withdraw(&mut token, root(), TRANSFER_AMOUNT, recipient, &mut events)
            .unwrap();
        assert_eq!(treasury.balance(&token), 0);
        assert_eq!(token.balance_of(&recipient), TRANSFER_AMOUNT);
        assert_eq!(
            events,
            vec![FlywheelEvent::TreasuryWithdrawn {
                to: recipient,
                amount: TRANSFER_AMOUNT
            }]
        );
    }
}
