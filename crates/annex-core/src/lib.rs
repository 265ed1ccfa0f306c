// crates/annex-core/src/lib.rs
//
// annex-core: Core identifiers and error types for the Annex reward flywheel.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines account and market identifiers, the activity dimensions a market
// can be tracked under, and the protocol-wide error type.

pub mod error;
pub mod identity;
pub mod market;

/// Block height as supplied by the host environment.
pub type BlockNumber = u64;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use annex_core::AccountId;`
pub use error::AnnexError;
pub use identity::AccountId;
pub use market::{ActivityKind, MarketId, VAI_MINT_MARKET};
