// crates/annex-flywheel/src/lib.rs
//
// annex-flywheel: index-based ANN reward accrual for the Annex protocol.
//
// Each eligible market carries a cumulative reward index. Emission flows into
// the index in proportion to elapsed blocks over total activity; accounts
// accrue the difference between the index and their last checkpoint, scaled
// by their own activity. Accrued ANN is paid out of a funded reward pool on
// claim.
//
// Fixed-point values use 1e18 (`Exp`) and 1e36 (`Double`) scales over a
// 256-bit integer. Token amounts are `u128` at 1e18 scale.

pub mod accrual;
pub mod activity;
pub mod admin;
pub mod claim;
pub mod comptroller;
pub mod error;
pub mod events;
pub mod exp;
pub mod ledger;
pub mod serde_u128;
pub mod snapshot;
pub mod token;
pub mod treasury;
pub mod tx;

// Re-export key types for ergonomic access from downstream crates.
pub use accrual::{emission_for, AccrualEngine, IndexUpdate};
pub use activity::{ActivityBook, ActivitySource, MarketBalances};
pub use admin::{AdminConfig, MarketListing};
pub use claim::{ClaimProcessor, ClaimRequest, ClaimSummary};
pub use comptroller::{Allocation, Comptroller, EmissionTotals, GenesisConfig};
pub use error::FlywheelError;
pub use events::FlywheelEvent;
pub use exp::{Double, Exp, EXP_SCALE, U256};
pub use ledger::{MarketEntry, MarketRewardState, RewardLedger};
pub use snapshot::{LedgerSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use token::{Ann, RewardVault, TokenLedger};
pub use treasury::Treasury;
pub use tx::{Receipt, Transaction};
