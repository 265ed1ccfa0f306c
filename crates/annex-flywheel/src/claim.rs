// crates/annex-flywheel/src/claim.rs
//
// ClaimProcessor: settle a batch of accounts across a set of markets, then pay
// each account its full accrued balance out of the reward pool.
//
// Payout is all-or-nothing per account. If the pool cannot cover an account's
// accrued balance the transfer is skipped and the balance stays owed, so
// `accrued` always equals exactly what is unpaid. That is a degraded outcome,
// not an error: the rest of the batch proceeds.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use annex_core::{AccountId, BlockNumber, MarketId};

use crate::accrual::AccrualEngine;
use crate::activity::ActivitySource;
use crate::error::FlywheelError;
use crate::events::FlywheelEvent;
use crate::exp::Exp;
use crate::ledger::RewardLedger;
use crate::token::{Ann, RewardVault};

/// Accounts and markets to claim for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Accounts to settle and pay, in order. Duplicates are allowed.
    pub accounts: Vec<AccountId>,
    /// Market filter; empty means every eligible market.
    #[serde(default)]
    pub markets: Vec<MarketId>,
    #[serde(default)]
    pub include_borrow: bool,
    #[serde(default)]
    pub include_supply: bool,
}

impl ClaimRequest {
    /// Claim for one account on every eligible mint market.
    pub fn single(account: AccountId) -> Self {
        Self {
            accounts: vec![account],
            markets: Vec::new(),
            include_borrow: false,
            include_supply: false,
        }
    }
}

/// What a claim paid and what it left owed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    pub markets_settled: Vec<MarketId>,
    pub paid: Vec<(AccountId, u128)>,
    pub deferred: Vec<(AccountId, u128)>,
}

impl ClaimSummary {
    pub fn total_paid(&self) -> u128 {
        self.paid.iter().map(|(_, amount)| amount).sum()
    }
}

pub struct ClaimProcessor;

impl ClaimProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn claim(
        ledger: &mut RewardLedger,
        rate: Exp,
        source: &dyn ActivitySource,
        vault: &mut dyn RewardVault,
        reward_pool: AccountId,
        height: BlockNumber,
        request: &ClaimRequest,
        events: &mut Vec<FlywheelEvent>,
    ) -> Result<ClaimSummary, FlywheelError> {
        if request.accounts.is_empty() {
            return Err(FlywheelError::EmptyClaim);
        }

        let markets = Self::select_markets(ledger, request)?;
        for market in &markets {
            AccrualEngine::update_global_index(
                ledger,
                market,
                height,
                rate,
                source.total_activity(market),
            )?;
            for account in &request.accounts {
                let activity = source.account_activity(market, account);
                AccrualEngine::settle_account(ledger, events, *account, market, activity)?;
            }
        }

        let mut summary = ClaimSummary {
            markets_settled: markets,
            ..ClaimSummary::default()
        };
        for account in &request.accounts {
            let owed = ledger.accrued(account);
            if owed == 0 {
                continue;
            }
            let available = vault.balance_of(&reward_pool);
            if available < owed {
                warn!(
                    account = %account,
                    owed = %Ann(owed),
                    available = %Ann(available),
                    "reward pool underfunded, payout deferred"
                );
                events.push(FlywheelEvent::RewardDeferred {
                    account: *account,
                    owed,
                    available,
                });
                summary.deferred.push((*account, owed));
                continue;
            }

            vault.transfer(reward_pool, *account, owed)?;
            ledger.set_accrued(*account, 0);
            info!(account = %account, amount = %Ann(owed), "reward granted");
            events.push(FlywheelEvent::RewardGranted {
                account: *account,
                amount: owed,
            });
            summary.paid.push((*account, owed));
        }

        Ok(summary)
    }

    /// Markets the request settles: the filter (or every eligible market)
    /// narrowed to the activity kinds the mode flags select.
    fn select_markets(
        ledger: &RewardLedger,
        request: &ClaimRequest,
    ) -> Result<Vec<MarketId>, FlywheelError> {
        let selected = |kind: annex_core::ActivityKind| {
            kind.selected_by(request.include_borrow, request.include_supply)
        };

        if request.markets.is_empty() {
            return Ok(ledger
                .eligible_markets()
                .filter(|(_, entry)| selected(entry.kind))
                .map(|(id, _)| id.clone())
                .collect());
        }

        let mut markets = Vec::with_capacity(request.markets.len());
        for id in &request.markets {
            let entry = ledger
                .market(id)
                .filter(|entry| entry.eligible)
                .ok_or_else(|| FlywheelError::UnknownMarket(id.clone()))?;
            if selected(entry.kind) && !markets.contains(id) {
                markets.push(id.clone());
            }
        }
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex_core::ActivityKind;

    use crate::activity::ActivityBook;
    use crate::exp::EXP_SCALE;
    use crate::token::TokenLedger;

    fn pool() -> AccountId {
        AccountId::repeat_byte(0xcc)
    }

    struct Fixture {
        ledger: RewardLedger,
        book: ActivityBook,
        token: TokenLedger,
        rate: Exp,
    }

    impl Fixture {
        fn new(pool_funding: u128) -> Self {
            let mut ledger = RewardLedger::new();
            ledger.list_market(MarketId::vai_mint(), ActivityKind::Mint, 0);
            let mut token = TokenLedger::new();
            token.issue(pool(), pool_funding).unwrap();
            Self {
                ledger,
                book: ActivityBook::new(),
                token,
                rate: Exp::from_mantissa(EXP_SCALE / 2),
            }
        }

        fn prime(&mut self, account: AccountId, amount: u128) {
            let market = MarketId::vai_mint();
            AccrualEngine::settle_account(&mut self.ledger, &mut Vec::new(), account, &market, 0)
                .unwrap();
            self.book.increase(&market, account, amount).unwrap();
        }

        fn claim(&mut self, height: BlockNumber, request: &ClaimRequest) -> ClaimSummary {
            ClaimProcessor::claim(
                &mut self.ledger,
                self.rate,
                &self.book,
                &mut self.token,
                pool(),
                height,
                request,
                &mut Vec::new(),
            )
            .unwrap()
        }
    }

    #[test]
    fn test_empty_claim_rejected() {
        let mut f = Fixture::new(0);
        let request = ClaimRequest {
            accounts: vec![],
            markets: vec![],
            include_borrow: false,
            include_supply: false,
        };
        let err = ClaimProcessor::claim(
            &mut f.ledger,
            f.rate,
            &f.book,
            &mut f.token,
            pool(),
            0,
            &request,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, FlywheelError::EmptyClaim);
    }

    #[test]
    fn test_claim_settles_and_pays() {
        let mut f = Fixture::new(50 * EXP_SCALE);
        let a = AccountId::repeat_byte(1);
        f.prime(a, 10 * EXP_SCALE);

        let summary = f.claim(10, &ClaimRequest::single(a));
        assert_eq!(summary.paid, vec![(a, 5 * EXP_SCALE)]);
        assert_eq!(f.token.balance_of(&a), 5 * EXP_SCALE);
        assert_eq!(f.ledger.accrued(&a), 0);
    }

    #[test]
    fn test_duplicates_do_not_double_pay() {
        let mut f = Fixture::new(50 * EXP_SCALE);
        let a = AccountId::repeat_byte(1);
        let b = AccountId::repeat_byte(2);
        f.prime(a, 10 * EXP_SCALE);
        f.prime(b, 10 * EXP_SCALE);

        let request = ClaimRequest {
            accounts: vec![a, b, a, b],
            markets: vec![],
            include_borrow: false,
            include_supply: false,
        };
        let summary = f.claim(10, &request);
        assert_eq!(summary.total_paid(), 5 * EXP_SCALE);
        assert_eq!(f.token.balance_of(&a), 5 * EXP_SCALE / 2);
        assert_eq!(f.token.balance_of(&b), 5 * EXP_SCALE / 2);
    }

    #[test]
    fn test_underfunded_account_is_deferred_not_reverted() {
        // Pool holds 3 ANN; a is owed 4, b is owed 1.
        let mut f = Fixture::new(3 * EXP_SCALE);
        let a = AccountId::repeat_byte(1);
        let b = AccountId::repeat_byte(2);
        f.prime(a, 8 * EXP_SCALE);
        f.prime(b, 2 * EXP_SCALE);

        let request = ClaimRequest {
            accounts: vec![a, b],
            markets: vec![],
            include_borrow: false,
            include_supply: false,
        };
        let summary = f.claim(10, &request);
        assert_eq!(summary.deferred, vec![(a, 4 * EXP_SCALE)]);
        assert_eq!(summary.paid, vec![(b, EXP_SCALE)]);
        assert_eq!(f.ledger.accrued(&a), 4 * EXP_SCALE);
        assert_eq!(f.token.balance_of(&a), 0);
        assert_eq!(f.token.balance_of(&pool()), 2 * EXP_SCALE);
    }

    #[test]
    fn test_mode_flags_select_market_kinds() {
        let mut f = Fixture::new(0);
        let borrow = MarketId::new("borrow-vbnb");
        f.ledger.list_market(borrow.clone(), ActivityKind::Borrow, 0);
        let a = AccountId::repeat_byte(1);

        let summary = f.claim(1, &ClaimRequest::single(a));
        assert_eq!(summary.markets_settled, vec![MarketId::vai_mint()]);

        let request = ClaimRequest {
            accounts: vec![a],
            markets: vec![],
            include_borrow: true,
            include_supply: false,
        };
        let summary = f.claim(2, &request);
        assert_eq!(
            summary.markets_settled,
            vec![borrow.clone(), MarketId::vai_mint()]
        );
    }

    #[test]
    fn test_market_filter_rejects_unlisted() {
        let mut f = Fixture::new(0);
        let request = ClaimRequest {
            accounts: vec![AccountId::repeat_byte(1)],
            markets: vec![MarketId::new("ghost")],
            include_borrow: true,
            include_supply: true,
        };
        let err = ClaimProcessor::claim(
            &mut f.ledger,
            f.rate,
            &f.book,
            &mut f.token,
            pool(),
            1,
            &request,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_market");
    }
}
