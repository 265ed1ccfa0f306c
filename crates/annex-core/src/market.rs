// crates/annex-core/src/market.rs
//
// Market identifiers and the activity dimension each market is tracked under.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the stablecoin (VAI) mint market, the market tracked by
/// default at genesis.
pub const VAI_MINT_MARKET: &str = "vai-mint";

/// Identifier of a reward-eligible market.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub String);

impl MarketId {
    pub fn new(id: impl Into<String>) -> Self {
        MarketId(id.into())
    }

    /// The VAI mint market.
    pub fn vai_mint() -> Self {
        MarketId(VAI_MINT_MARKET.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        MarketId(s.to_string())
    }
}

/// Which dimension of protocol activity a market's rewards follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Stablecoin minting. Always settled on claim.
    Mint,
    /// Borrow balances. Settled on claim only when borrowers are included.
    Borrow,
    /// Supply balances. Settled on claim only when suppliers are included.
    Supply,
}

impl ActivityKind {
    /// Whether a claim with the given mode flags settles markets of this kind.
    pub fn selected_by(self, include_borrow: bool, include_supply: bool) -> bool {
        match self {
            ActivityKind::Mint => true,
            ActivityKind::Borrow => include_borrow,
            ActivityKind::Supply => include_supply,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Mint => f.pad("mint"),
            ActivityKind::Borrow => f.pad("borrow"),
            ActivityKind::Supply => f.pad("supply"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_always_selected() {
        assert!(ActivityKind::Mint.selected_by(false, false));
        assert!(ActivityKind::Mint.selected_by(true, true));
    }

    #[test]
    fn test_borrow_and_supply_follow_flags() {
        assert!(!ActivityKind::Borrow.selected_by(false, true));
        assert!(ActivityKind::Borrow.selected_by(true, false));
        assert!(!ActivityKind::Supply.selected_by(true, false));
        assert!(ActivityKind::Supply.selected_by(false, true));
    }

    #[test]
    fn test_market_id_serializes_transparently() {
        let json = serde_json::to_string(&MarketId::vai_mint()).unwrap();
        assert_eq!(json, "\"vai-mint\"");
    }
}
