// crates/annex-flywheel/src/accrual.rs
//
// AccrualEngine: the only path by which market indices and account
// checkpoints move.
//
// update_global_index:
//   delta_blocks = height - state.block
//   accrued      = rate * delta_blocks
//   index       += accrued * 1e36 / total_activity   (skipped if total is 0)
//
// settle_account:
//   first touch -> checkpoint = index, nothing accrued
//   otherwise   -> accrued += activity * (index - checkpoint) / 1e36

use tracing::debug;

use annex_core::{AccountId, BlockNumber, MarketId};

use crate::error::FlywheelError;
use crate::events::FlywheelEvent;
use crate::exp::{self, mul_amount_by_double, Double, Exp, U256};
use crate::ledger::{MarketRewardState, RewardLedger};

/// What one call to `update_global_index` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexUpdate {
    pub previous: MarketRewardState,
    pub current: MarketRewardState,
    /// ANN emitted over the interval (`rate * delta_blocks`), whether or
    /// not anyone could receive it.
    pub emitted: U256,
}

impl IndexUpdate {
    /// True when the interval's emission had no denominator to land on.
    pub fn discarded(&self) -> bool {
        !self.emitted.is_zero() && self.previous.index == self.current.index
    }
}

pub struct AccrualEngine;

impl AccrualEngine {
    /// Advance `market`'s index to `height`.
    ///
    /// Repeated calls at the same height are no-ops. A height below the
    /// stored block is an invariant violation (`ClockRegression`).
    pub fn update_global_index(
        ledger: &mut RewardLedger,
        market: &MarketId,
        height: BlockNumber,
        rate: Exp,
        total_activity: u128,
    ) -> Result<IndexUpdate, FlywheelError> {
        let state = ledger.market_state(market)?;
        let next = Self::next_state(market, state, height, rate, total_activity)?;
        let emitted = rate.mul_scalar(height - state.block)?;

        if next != state {
            ledger.set_market_state(market, next)?;
            debug!(
                market = %market,
                block = height,
                index = %next.index,
                total_activity,
                "market index advanced"
            );
        }

        Ok(IndexUpdate {
            previous: state,
            current: next,
            emitted,
        })
    }

    /// Pure form of the index update. Deterministic in its inputs.
    pub fn next_state(
        market: &MarketId,
        state: MarketRewardState,
        height: BlockNumber,
        rate: Exp,
        total_activity: u128,
    ) -> Result<MarketRewardState, FlywheelError> {
        if height < state.block {
            return Err(FlywheelError::ClockRegression {
                market: market.clone(),
                stored: state.block,
                supplied: height,
            });
        }

        let delta_blocks = height - state.block;
        if delta_blocks == 0 {
            return Ok(state);
        }

        let accrued = rate.mul_scalar(delta_blocks)?;
        // Nothing to divide by: the interval's emission goes to no one.
        let index = if total_activity == 0 || accrued.is_zero() {
            state.index
        } else {
            let ratio = Double::fraction(accrued, U256::from(total_activity))?;
            state.index.checked_add(ratio)?
        };

        Ok(MarketRewardState {
            index,
            block: height,
        })
    }

    /// Settle `account` on `market` against the market's current index and
    /// return the amount added to its accrued balance.
    ///
    /// `activity` is the account's activity amount over the window since its
    /// last settlement, i.e. the balance before the operation that triggered
    /// this call.
    pub fn settle_account(
        ledger: &mut RewardLedger,
        events: &mut Vec<FlywheelEvent>,
        account: AccountId,
        market: &MarketId,
        activity: u128,
    ) -> Result<u128, FlywheelError> {
        let current = ledger.market_state(market)?.index;

        let delta = match ledger.checkpoint(market, &account) {
            // First touch primes the checkpoint; earlier activity never
            // accrues retroactively.
            None => 0,
            Some(checkpoint) => {
                let delta_index = current.checked_sub(checkpoint)?;
                mul_amount_by_double(activity, delta_index)?
            }
        };

        let accrued = ledger
            .accrued(&account)
            .checked_add(delta)
            .ok_or(FlywheelError::ArithmeticOverflow("accrued balance"))?;
        ledger.set_accrued(account, accrued);
        ledger.set_checkpoint(market, account, current);

        debug!(
            account = %account,
            market = %market,
            delta,
            index = %current,
            "account settled"
        );
        events.push(FlywheelEvent::DistributedMinterReward {
            account,
            amount_delta: delta,
            resulting_index: current,
        });

        Ok(delta)
    }
}

/// Emission over `blocks` at `rate`, narrowed to a token amount.
pub fn emission_for(rate: Exp, blocks: u64) -> Result<u128, FlywheelError> {
    exp::to_amount(rate.mul_scalar(blocks)?, "emission")
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex_core::ActivityKind;

    use crate::exp::{double_scale, EXP_SCALE};

    fn e18(n: u128) -> u128 {
        n * EXP_SCALE
    }

    fn double(whole: u64) -> Double {
        Double::from_mantissa(U256::from(whole) * double_scale())
    }

    fn ledger_with_vai(state: MarketRewardState) -> (RewardLedger, MarketId) {
        let market = MarketId::vai_mint();
        let mut ledger = RewardLedger::new();
        ledger.list_market(market.clone(), ActivityKind::Mint, 0);
        ledger.set_market_state(&market, state).unwrap();
        (ledger, market)
    }

    #[test]
    fn test_index_update_matches_worked_example() {
        // rate 0.5e18, supply 10e18, 100 blocks: 1e36 + 50e18 * 1e36 / 10e18 = 6e36
        let (mut ledger, market) = ledger_with_vai(MarketRewardState::initial(0));
        let rate = Exp::from_mantissa(e18(1) / 2);

        let update =
            AccrualEngine::update_global_index(&mut ledger, &market, 100, rate, e18(10)).unwrap();
        assert_eq!(update.current.index, double(6));
        assert_eq!(update.current.block, 100);
        assert_eq!(update.emitted, U256::from(e18(50)));

        // Same block again: nothing moves.
        let again =
            AccrualEngine::update_global_index(&mut ledger, &market, 100, rate, e18(10)).unwrap();
        assert_eq!(again.previous, again.current);
        let state = ledger.market_state(&market).unwrap();
        assert_eq!(state.index, double(6));
        assert_eq!(state.block, 100);
    }

    #[test]
    fn test_no_blocks_elapsed_is_noop() {
        let (mut ledger, market) = ledger_with_vai(MarketRewardState::initial(0));
        let rate = Exp::from_mantissa(e18(1) / 2);
        AccrualEngine::update_global_index(&mut ledger, &market, 0, rate, e18(10)).unwrap();
        assert_eq!(
            ledger.market_state(&market).unwrap(),
            MarketRewardState::initial(0)
        );
    }

    #[test]
    fn test_clock_regression() {
        let (mut ledger, market) = ledger_with_vai(MarketRewardState {
            index: Double::one(),
            block: 50,
        });
        let err = AccrualEngine::update_global_index(&mut ledger, &market, 49, Exp::one(), 1)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(ledger.market_state(&market).unwrap().block, 50);
    }

    #[test]
    fn test_zero_supply_discards_emission_but_advances_block() {
        let (mut ledger, market) = ledger_with_vai(MarketRewardState::initial(0));
        let update =
            AccrualEngine::update_global_index(&mut ledger, &market, 10, Exp::one(), 0).unwrap();
        assert!(update.discarded());
        assert_eq!(update.current.index, Double::one());
        assert_eq!(update.current.block, 10);
    }

    #[test]
    fn test_first_touch_primes_without_accrual() {
        let (mut ledger, market) = ledger_with_vai(MarketRewardState {
            index: double(6),
            block: 10,
        });
        let account = AccountId::repeat_byte(1);
        let mut events = Vec::new();

        let delta =
            AccrualEngine::settle_account(&mut ledger, &mut events, account, &market, e18(5))
                .unwrap();
        assert_eq!(delta, 0);
        assert_eq!(ledger.accrued(&account), 0);
        assert_eq!(ledger.checkpoint(&market, &account), Some(double(6)));
    }

    #[test]
    fn test_repeat_settlement_is_proportional() {
        let (mut ledger, market) = ledger_with_vai(MarketRewardState {
            index: double(6),
            block: 10,
        });
        let account = AccountId::repeat_byte(2);
        ledger.set_checkpoint(&market, account, double(1));
        let mut events = Vec::new();

        let delta =
            AccrualEngine::settle_account(&mut ledger, &mut events, account, &market, e18(5))
                .unwrap();
        assert_eq!(delta, e18(25));
        assert_eq!(ledger.accrued(&account), e18(25));
        assert_eq!(ledger.checkpoint(&market, &account), Some(double(6)));
        assert_eq!(
            events,
            vec![FlywheelEvent::DistributedMinterReward {
                account,
                amount_delta: e18(25),
                resulting_index: double(6),
            }]
        );

        // Settling again observes a zero index delta.
        let again =
            AccrualEngine::settle_account(&mut ledger, &mut events, account, &market, e18(5))
                .unwrap();
        assert_eq!(again, 0);
        assert_eq!(ledger.accrued(&account), e18(25));
    }

    #[test]
    fn test_small_accrual_is_recorded() {
        // index 1.0019e36 against checkpoint 1e36, amount 5e17 -> 0.00095e18
        let index = Double::from_mantissa(double_scale() + U256::from(19u8) * U256::exp10(32));
        let (mut ledger, market) = ledger_with_vai(MarketRewardState { index, block: 10 });
        let account = AccountId::repeat_byte(3);
        ledger.set_checkpoint(&market, account, Double::one());

        let delta = AccrualEngine::settle_account(
            &mut ledger,
            &mut Vec::new(),
            account,
            &market,
            e18(1) / 2,
        )
        .unwrap();
        assert_eq!(delta, 950_000_000_000_000);
        assert_eq!(ledger.accrued(&account), 950_000_000_000_000);
    }

    #[test]
    fn test_truncation_never_overpays() {
        // 5e18 over a 12e18 supply for 10 blocks: the holder of the whole
        // supply receives 5e18 - 1 because both divisions truncate.
        let (mut ledger, market) = ledger_with_vai(MarketRewardState::initial(0));
        let account = AccountId::repeat_byte(4);
        let mut events = Vec::new();
        AccrualEngine::settle_account(&mut ledger, &mut events, account, &market, 0).unwrap();

        let rate = Exp::from_mantissa(e18(1) / 2);
        AccrualEngine::update_global_index(&mut ledger, &market, 10, rate, e18(12)).unwrap();
        let delta =
            AccrualEngine::settle_account(&mut ledger, &mut events, account, &market, e18(12))
                .unwrap();
        assert_eq!(delta, e18(5) - 1);
        assert!(delta <= emission_for(rate, 10).unwrap());
    }
}
