// crates/annex-flywheel/src/error.rs
//
// Failure taxonomy of the flywheel. Every variant aborts the enclosing
// transaction; an underfunded reward pool is not an error (see claim.rs).

use thiserror::Error;

use annex_core::{AccountId, AnnexError, BlockNumber, MarketId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlywheelError {
    /// An admin-only mutation was attempted by someone else.
    #[error("only admin can {action} (caller {caller})")]
    Unauthorized { caller: AccountId, action: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("arithmetic underflow in {0}")]
    ArithmeticUnderflow(&'static str),

    /// Block height moved backwards relative to the stored market state.
    /// Never reachable from correctly ordered callers.
    #[error("clock regression on market {market}: stored block {stored}, supplied {supplied}")]
    ClockRegression {
        market: MarketId,
        stored: BlockNumber,
        supplied: BlockNumber,
    },

    /// A transaction was submitted at a height below the last committed one.
    #[error("block height regression: last committed {stored}, supplied {supplied}")]
    HeightRegression {
        stored: BlockNumber,
        supplied: BlockNumber,
    },

    #[error("caller is not the owner")]
    NotOwner { caller: AccountId },

    #[error("withdraw amount should be less than balance (requested {requested}, balance {balance})")]
    WithdrawExceedsBalance { requested: u128, balance: u128 },

    #[error("insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        requested: u128,
        available: u128,
    },

    #[error("market {0} is not listed")]
    UnknownMarket(MarketId),

    #[error("claim requires at least one account")]
    EmptyClaim,
}

impl FlywheelError {
    /// Stable, machine-checkable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            FlywheelError::Unauthorized { .. } => "unauthorized",
            FlywheelError::DivisionByZero => "division_by_zero",
            FlywheelError::ArithmeticOverflow(_) => "arithmetic_overflow",
            FlywheelError::ArithmeticUnderflow(_) => "arithmetic_underflow",
            FlywheelError::ClockRegression { .. } => "clock_regression",
            FlywheelError::HeightRegression { .. } => "height_regression",
            FlywheelError::NotOwner { .. } => "not_owner",
            FlywheelError::WithdrawExceedsBalance { .. } => "withdraw_exceeds_balance",
            FlywheelError::InsufficientBalance { .. } => "insufficient_balance",
            FlywheelError::UnknownMarket(_) => "unknown_market",
            FlywheelError::EmptyClaim => "empty_claim",
        }
    }

    /// Invariant faults that indicate a bug in the caller rather than a
    /// rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlywheelError::ClockRegression { .. } | FlywheelError::HeightRegression { .. }
        )
    }
}

impl From<FlywheelError> for AnnexError {
    fn from(e: FlywheelError) -> Self {
        AnnexError::InvalidState(format!("{}: {}", e.code(), e))
    }
}
