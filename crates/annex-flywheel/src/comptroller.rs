// crates/annex-flywheel/src/comptroller.rs
//
// Comptroller: executes transactions against the flywheel state.
//
// Every transaction runs against a scratch copy of the state. Its mutations
// and events are committed together when it succeeds and discarded together
// when it fails, so a rejected transaction leaves nothing behind. Callers
// must submit transactions one at a time with non-decreasing heights.
//
// Each transaction starts by advancing every eligible market index to its
// height; the market hooks then settle the affected accounts with their
// pre-operation activity before balances change.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use annex_core::{AccountId, BlockNumber, MarketId};

use crate::accrual::{AccrualEngine, IndexUpdate};
use crate::activity::{ActivityBook, ActivitySource};
use crate::admin::{AdminConfig, MarketListing};
use crate::claim::{ClaimProcessor, ClaimRequest, ClaimSummary};
use crate::error::FlywheelError;
use crate::events::FlywheelEvent;
use crate::exp::{self, Exp, U256};
use crate::ledger::{MarketRewardState, RewardLedger};
use crate::token::{RewardVault, TokenLedger};
use crate::treasury::Treasury;
use crate::tx::{Receipt, Transaction};

/// Initial ANN balance for an account at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: AccountId,
    #[serde(with = "crate::serde_u128")]
    pub amount: u128,
}

/// Everything needed to stand up a fresh comptroller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub admin: AccountId,
    pub emission_rate: Exp,
    /// Account the claim path pays rewards out of.
    pub reward_pool: AccountId,
    pub treasury_account: AccountId,
    pub treasury_owner: AccountId,
    #[serde(default)]
    pub markets: Vec<MarketListing>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub start_block: BlockNumber,
}

/// Running totals, kept for reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionTotals {
    /// `rate * elapsed` summed over every eligible market and interval.
    #[serde(with = "crate::serde_u128")]
    pub emitted: u128,
    /// Part of `emitted` that fell on a zero denominator.
    #[serde(with = "crate::serde_u128")]
    pub discarded: u128,
    /// ANN actually transferred out of the reward pool.
    #[serde(with = "crate::serde_u128")]
    pub paid: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comptroller {
    height: BlockNumber,
    config: AdminConfig,
    ledger: RewardLedger,
    activity: ActivityBook,
    token: TokenLedger,
    treasury: Treasury,
    reward_pool: AccountId,
    totals: EmissionTotals,
}

impl Comptroller {
    pub fn genesis(genesis: GenesisConfig) -> Result<Self, FlywheelError> {
        let mut ledger = RewardLedger::new();
        for listing in genesis.markets {
            ledger.list_market(listing.id, listing.kind, genesis.start_block);
        }

        let mut token = TokenLedger::new();
        for allocation in genesis.allocations {
            token.issue(allocation.account, allocation.amount)?;
        }

        Ok(Self {
            height: genesis.start_block,
            config: AdminConfig::new(genesis.admin, genesis.emission_rate),
            ledger,
            activity: ActivityBook::new(),
            token,
            treasury: Treasury::new(genesis.treasury_account, genesis.treasury_owner),
            reward_pool: genesis.reward_pool,
            totals: EmissionTotals::default(),
        })
    }

    /// Height of the last committed transaction.
    pub fn height(&self) -> BlockNumber {
        self.height
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    pub fn activity(&self) -> &ActivityBook {
        &self.activity
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn reward_pool(&self) -> AccountId {
        self.reward_pool
    }

    pub fn totals(&self) -> EmissionTotals {
        self.totals
    }

    pub fn accrued(&self, account: &AccountId) -> u128 {
        self.ledger.accrued(account)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.token.balance_of(account)
    }

    pub fn market_state(&self, market: &MarketId) -> Result<MarketRewardState, FlywheelError> {
        self.ledger.market_state(market)
    }

    /// Apply one transaction at `height`. On error the state is unchanged.
    pub fn apply(
        &mut self,
        height: BlockNumber,
        tx: Transaction,
    ) -> Result<Receipt, FlywheelError> {
        let op = tx.op();
        let result = self.transact(height, |c, events| c.execute(tx, events));
        match result {
            Ok(((), events)) => {
                debug!(op, block = height, events = events.len(), "transaction committed");
                Ok(Receipt {
                    block: height,
                    op: op.to_string(),
                    events,
                })
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(op, block = height, error = %e, "invariant violation");
                } else {
                    debug!(op, block = height, error = %e, "transaction rejected");
                }
                Err(e)
            }
        }
    }

    /// Claim on behalf of `request.accounts`, returning the payout summary
    /// alongside the receipt.
    pub fn claim(
        &mut self,
        height: BlockNumber,
        request: ClaimRequest,
    ) -> Result<(ClaimSummary, Receipt), FlywheelError> {
        let (summary, events) = self.transact(height, |c, events| c.claim_inner(&request, events))?;
        Ok((
            summary,
            Receipt {
                block: height,
                op: "claim".to_string(),
                events,
            },
        ))
    }

    /// Advance the VAI mint market index to `height`. A delisted market's
    /// index stays frozen and the returned update is a no-op.
    pub fn update_mint_index(&mut self, height: BlockNumber) -> Result<IndexUpdate, FlywheelError> {
        let market = MarketId::vai_mint();
        let (update, _) = self.transact(height, |c, _| {
            let (eligible, state) = c
                .ledger
                .market(&market)
                .map(|entry| (entry.eligible, entry.state))
                .ok_or_else(|| FlywheelError::UnknownMarket(market.clone()))?;
            if eligible {
                c.update_index(&market)
            } else {
                Ok(IndexUpdate {
                    previous: state,
                    current: state,
                    emitted: U256::zero(),
                })
            }
        })?;
        Ok(update)
    }

    /// Settle `account` on the VAI mint market at the last committed height.
    pub fn distribute_minter_reward(
        &mut self,
        account: AccountId,
    ) -> Result<Receipt, FlywheelError> {
        let market = MarketId::vai_mint();
        let height = self.height;
        let (_, events) = self.transact(height, |c, events| {
            c.settle(account, &market, events).map(|_| ())
        })?;
        Ok(Receipt {
            block: height,
            op: "distribute_minter_reward".to_string(),
            events,
        })
    }

    fn transact<T>(
        &mut self,
        height: BlockNumber,
        f: impl FnOnce(&mut Self, &mut Vec<FlywheelEvent>) -> Result<T, FlywheelError>,
    ) -> Result<(T, Vec<FlywheelEvent>), FlywheelError> {
        if height < self.height {
            return Err(FlywheelError::HeightRegression {
                stored: self.height,
                supplied: height,
            });
        }

        let mut next = self.clone();
        next.height = height;
        let mut events = Vec::new();
        next.sync_markets()?;
        let out = f(&mut next, &mut events)?;

        *self = next;
        Ok((out, events))
    }

    fn execute(
        &mut self,
        tx: Transaction,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        let height = self.height;
        match tx {
            Transaction::AdvanceBlock => Ok(()),
            Transaction::Mint {
                account,
                amount,
                market,
            } => {
                self.before_activity_change(&market, &[account], events)?;
                self.activity.increase(&market, account, amount)
            }
            Transaction::Redeem {
                account,
                amount,
                market,
            } => {
                self.before_activity_change(&market, &[account], events)?;
                self.activity.decrease(&market, account, amount)
            }
            Transaction::Transfer {
                from,
                to,
                amount,
                market,
            } => {
                self.before_activity_change(&market, &[from, to], events)?;
                self.activity.transfer(&market, from, to, amount)
            }
            Transaction::Claim(request) => self.claim_inner(&request, events).map(|_| ()),
            Transaction::SetEmissionRate { caller, rate } => self.config.set_emission_rate(
                &mut self.ledger,
                &self.activity,
                height,
                caller,
                rate,
                events,
            ),
            Transaction::AddMarket { caller, listing } => {
                self.config
                    .add_market(&mut self.ledger, height, caller, listing, events)
            }
            Transaction::SetEligibleMarkets { caller, markets } => {
                self.config.set_eligible_markets(
                    &mut self.ledger,
                    &self.activity,
                    height,
                    caller,
                    markets,
                    events,
                )
            }
            Transaction::SetAccrued {
                caller,
                account,
                amount,
            } => self
                .config
                .set_accrued(&mut self.ledger, caller, account, amount, events),
            Transaction::TransferAdmin { caller, new_admin } => {
                self.config.transfer_admin(caller, new_admin, events)
            }
            Transaction::FundRewardPool { from, amount } => {
                self.token.transfer(from, self.reward_pool, amount)
            }
            Transaction::TreasuryWithdraw { caller, amount, to } => {
                self.treasury
                    .withdraw(&mut self.token, caller, amount, to, events)
            }
            Transaction::TransferTreasuryOwnership { caller, new_owner } => {
                self.treasury.transfer_ownership(caller, new_owner, events)
            }
        }
    }

    /// Bring every eligible market index up to the current height and
    /// record what the interval emitted.
    fn sync_markets(&mut self) -> Result<(), FlywheelError> {
        let eligible: Vec<MarketId> = self
            .ledger
            .eligible_markets()
            .map(|(id, _)| id.clone())
            .collect();
        for market in &eligible {
            self.update_index(market)?;
        }
        Ok(())
    }

    fn update_index(&mut self, market: &MarketId) -> Result<IndexUpdate, FlywheelError> {
        let update = AccrualEngine::update_global_index(
            &mut self.ledger,
            market,
            self.height,
            self.config.emission_rate(),
            self.activity.total_activity(market),
        )?;
        let emitted = exp::to_amount(update.emitted, "emission total")?;
        self.totals.emitted = self
            .totals
            .emitted
            .checked_add(emitted)
            .ok_or(FlywheelError::ArithmeticOverflow("emission total"))?;
        if update.discarded() {
            self.totals.discarded = self
                .totals
                .discarded
                .checked_add(emitted)
                .ok_or(FlywheelError::ArithmeticOverflow("discarded total"))?;
        }
        Ok(update)
    }

    fn settle(
        &mut self,
        account: AccountId,
        market: &MarketId,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<u128, FlywheelError> {
        let activity = self.activity.account_activity(market, &account);
        AccrualEngine::settle_account(&mut self.ledger, events, account, market, activity)
    }

    /// The lending-market hook: update the index, then settle each affected
    /// account on its pre-operation balance. Delisted markets keep their
    /// index frozen but still settle, so checkpoints stay primed.
    fn before_activity_change(
        &mut self,
        market: &MarketId,
        accounts: &[AccountId],
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        let entry = self
            .ledger
            .market(market)
            .ok_or_else(|| FlywheelError::UnknownMarket(market.clone()))?;
        if entry.eligible {
            self.update_index(market)?;
        }
        for account in accounts {
            self.settle(*account, market, events)?;
        }
        Ok(())
    }

    fn claim_inner(
        &mut self,
        request: &ClaimRequest,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<ClaimSummary, FlywheelError> {
        let summary = ClaimProcessor::claim(
            &mut self.ledger,
            self.config.emission_rate(),
            &self.activity,
            &mut self.token,
            self.reward_pool,
            self.height,
            request,
            events,
        )?;
        self.totals.paid = self
            .totals
            .paid
            .checked_add(summary.total_paid())
            .ok_or(FlywheelError::ArithmeticOverflow("paid total"))?;
        Ok(summary)
    }
}
