// crates/annex-flywheel/src/admin.rs
//
// AdminConfig: the emission rate, the admin principal, and every mutation
// only the admin may perform. All of them pass through `ensure_admin`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use annex_core::{AccountId, ActivityKind, BlockNumber, MarketId};

use crate::accrual::AccrualEngine;
use crate::activity::ActivitySource;
use crate::error::FlywheelError;
use crate::events::FlywheelEvent;
use crate::exp::Exp;
use crate::ledger::RewardLedger;

/// A market to list, as given to `set_eligible_markets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: MarketId,
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    admin: AccountId,
    /// ANN emitted per block on each eligible market (1e18 scale).
    emission_rate: Exp,
}

impl AdminConfig {
    pub fn new(admin: AccountId, emission_rate: Exp) -> Self {
        Self {
            admin,
            emission_rate,
        }
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    pub fn emission_rate(&self) -> Exp {
        self.emission_rate
    }

    /// The single capability check shared by every admin-only mutator.
    pub fn ensure_admin(&self, caller: AccountId, action: &str) -> Result<(), FlywheelError> {
        if caller != self.admin {
            warn!(caller = %caller, action, "rejected non-admin call");
            return Err(FlywheelError::Unauthorized {
                caller,
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// Replace the emission rate.
    ///
    /// Eligible markets are first brought up to `height` at the old rate, so
    /// the new rate only applies to blocks after the change.
    pub fn set_emission_rate(
        &mut self,
        ledger: &mut RewardLedger,
        source: &dyn ActivitySource,
        height: BlockNumber,
        caller: AccountId,
        new_rate: Exp,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_admin(caller, "set emission rate")?;

        let eligible: Vec<MarketId> = ledger.eligible_markets().map(|(id, _)| id.clone()).collect();
        for market in &eligible {
            AccrualEngine::update_global_index(
                ledger,
                market,
                height,
                self.emission_rate,
                source.total_activity(market),
            )?;
        }

        let old_rate = self.emission_rate;
        self.emission_rate = new_rate;
        info!(old_rate = %old_rate, new_rate = %new_rate, "emission rate changed");
        events.push(FlywheelEvent::RateChanged { old_rate, new_rate });
        Ok(())
    }

    /// List one market. A market that already has state keeps it.
    pub fn add_market(
        &self,
        ledger: &mut RewardLedger,
        height: BlockNumber,
        caller: AccountId,
        listing: MarketListing,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_admin(caller, "add market")?;
        Self::list(ledger, height, listing, events);
        Ok(())
    }

    /// Make `listings` the exact set of eligible markets.
    ///
    /// Markets dropped from the set are settled up to `height` at the current
    /// rate and then delisted; their state is kept.
    pub fn set_eligible_markets(
        &self,
        ledger: &mut RewardLedger,
        source: &dyn ActivitySource,
        height: BlockNumber,
        caller: AccountId,
        listings: Vec<MarketListing>,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_admin(caller, "set eligible markets")?;

        let dropped: Vec<MarketId> = ledger
            .eligible_markets()
            .map(|(id, _)| id.clone())
            .filter(|id| !listings.iter().any(|l| &l.id == id))
            .collect();

        for market in dropped {
            AccrualEngine::update_global_index(
                ledger,
                &market,
                height,
                self.emission_rate,
                source.total_activity(&market),
            )?;
            if ledger.delist_market(&market) {
                info!(market = %market, "market delisted");
                events.push(FlywheelEvent::MarketDelisted { market });
            }
        }

        for listing in listings {
            Self::list(ledger, height, listing, events);
        }
        Ok(())
    }

    /// Override an account's accrued balance. Bootstrapping and tests.
    pub fn set_accrued(
        &self,
        ledger: &mut RewardLedger,
        caller: AccountId,
        account: AccountId,
        amount: u128,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_admin(caller, "set accrued")?;
        ledger.set_accrued(account, amount);
        events.push(FlywheelEvent::AccruedOverridden { account, amount });
        Ok(())
    }

    pub fn transfer_admin(
        &mut self,
        caller: AccountId,
        new_admin: AccountId,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<(), FlywheelError> {
        self.ensure_admin(caller, "transfer admin")?;
        let old_admin = self.admin;
        self.admin = new_admin;
        info!(old_admin = %old_admin, new_admin = %new_admin, "admin changed");
        events.push(FlywheelEvent::AdminChanged {
            old_admin,
            new_admin,
        });
        Ok(())
    }

    fn list(
        ledger: &mut RewardLedger,
        height: BlockNumber,
        listing: MarketListing,
        events: &mut Vec<FlywheelEvent>,
    ) {
        let MarketListing { id, kind } = listing;
        if ledger.list_market(id.clone(), kind, height) {
            info!(market = %id, kind = %kind, block = height, "market listed");
            events.push(FlywheelEvent::MarketListed { market: id, kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityBook;
    use crate::exp::EXP_SCALE;

    fn admin() -> AccountId {
        AccountId::repeat_byte(0xad)
    }

    fn setup() -> (AdminConfig, RewardLedger, ActivityBook) {
        let config = AdminConfig::new(admin(), Exp::from_mantissa(EXP_SCALE / 2));
        let mut ledger = RewardLedger::new();
        ledger.list_market(MarketId::vai_mint(), ActivityKind::Mint, 0);
        (config, ledger, ActivityBook::new())
    }

    #[test]
    fn test_admin_sets_rate_and_reports_old_and_new() {
        let (mut config, mut ledger, book) = setup();
        let mut events = Vec::new();
        config
            .set_emission_rate(
                &mut ledger,
                &book,
                0,
                admin(),
                Exp::from_mantissa(3 * EXP_SCALE),
                &mut events,
            )
            .unwrap();
        config
            .set_emission_rate(
                &mut ledger,
                &book,
                0,
                admin(),
                Exp::from_mantissa(2 * EXP_SCALE),
                &mut events,
            )
            .unwrap();

        assert_eq!(config.emission_rate(), Exp::from_mantissa(2 * EXP_SCALE));
        assert_eq!(
            events.last(),
            Some(&FlywheelEvent::RateChanged {
                old_rate: Exp::from_mantissa(3 * EXP_SCALE),
                new_rate: Exp::from_mantissa(2 * EXP_SCALE),
            })
        );
    }

    #[test]
    fn test_non_admin_rate_change_rejected() {
        let (mut config, mut ledger, book) = setup();
        let mut events = Vec::new();
        let err = config
            .set_emission_rate(
                &mut ledger,
                &book,
                0,
                AccountId::repeat_byte(1),
                Exp::one(),
                &mut events,
            )
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
        assert!(err.to_string().starts_with("only admin can"));
        assert_eq!(config.emission_rate(), Exp::from_mantissa(EXP_SCALE / 2));
        assert!(events.is_empty());
    }

    #[test]
    fn test_rate_change_settles_old_rate_first() {
        let (mut config, mut ledger, mut book) = setup();
        let market = MarketId::vai_mint();
        book.increase(&market, AccountId::repeat_byte(1), 10 * EXP_SCALE)
            .unwrap();
        config
            .set_emission_rate(&mut ledger, &book, 100, admin(), Exp::zero(), &mut Vec::new())
            .unwrap();
        // 100 blocks at 0.5 over 10 supply: +5.0
        let state = ledger.market_state(&market).unwrap();
        assert_eq!(state.block, 100);
        assert_eq!(state.index.to_exp(), Exp::from_mantissa(6 * EXP_SCALE));
    }

    #[test]
    fn test_add_market_is_admin_gated_and_idempotent() {
        let (config, mut ledger, _) = setup();
        let listing = MarketListing {
            id: MarketId::new("borrow-vbnb"),
            kind: ActivityKind::Borrow,
        };
        assert!(config
            .add_market(&mut ledger, 5, AccountId::repeat_byte(1), listing.clone(), &mut Vec::new())
            .is_err());

        let mut events = Vec::new();
        config
            .add_market(&mut ledger, 5, admin(), listing.clone(), &mut events)
            .unwrap();
        config
            .add_market(&mut ledger, 9, admin(), listing.clone(), &mut events)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(ledger.market_state(&listing.id).unwrap().block, 5);
    }

    #[test]
    fn test_set_eligible_markets_delists_missing() {
        let (config, mut ledger, book) = setup();
        let borrow = MarketListing {
            id: MarketId::new("borrow-vbnb"),
            kind: ActivityKind::Borrow,
        };
        let mut events = Vec::new();
        config
            .set_eligible_markets(&mut ledger, &book, 7, admin(), vec![borrow.clone()], &mut events)
            .unwrap();

        let eligible: Vec<&MarketId> = ledger.eligible_markets().map(|(id, _)| id).collect();
        assert_eq!(eligible, vec![&borrow.id]);
        assert!(ledger.market(&MarketId::vai_mint()).is_some());
        assert_eq!(
            events,
            vec![
                FlywheelEvent::MarketDelisted {
                    market: MarketId::vai_mint()
                },
                FlywheelEvent::MarketListed {
                    market: borrow.id.clone(),
                    kind: ActivityKind::Borrow
                },
            ]
        );
    }

    #[test]
    fn test_set_accrued_and_transfer_admin() {
        let (mut config, mut ledger, _) = setup();
        let user = AccountId::repeat_byte(1);
        let mut events = Vec::new();
        config
            .set_accrued(&mut ledger, admin(), user, 900, &mut events)
            .unwrap();
        assert_eq!(ledger.accrued(&user), 900);

        config.transfer_admin(admin(), user, &mut events).unwrap();
        assert_eq!(config.admin(), user);
        assert!(config
            .set_accrued(&mut ledger, admin(), user, 0, &mut events)
            .is_err());
    }
}
