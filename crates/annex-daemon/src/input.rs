// crates/annex-daemon/src/input.rs
//
// JSON-lines transaction intake.
//
// One transaction per line, with an optional `block` alongside the `op` tag:
//
//   {"block": 10, "op": "mint", "account": "0x..", "amount": "12000000000000000000"}
//   {"op": "claim", "accounts": ["0x.."]}
//
// Blank lines and lines starting with `#` are skipped.

use serde::Deserialize;

use annex_core::{AnnexError, BlockNumber};
use annex_flywheel::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    /// Height to apply at. Absent means "now" (the block clock in serve
    /// mode, the previous height in replay mode).
    #[serde(default)]
    pub block: Option<BlockNumber>,
    #[serde(flatten)]
    pub tx: Transaction,
}

/// Parse one input line. `Ok(None)` for lines carrying no transaction.
pub fn parse_line(line: &str) -> Result<Option<Submission>, AnnexError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let submission = serde_json::from_str(trimmed)
        .map_err(|e| AnnexError::InvalidInput(format!("bad transaction line: {}", e)))?;
    Ok(Some(submission))
}
