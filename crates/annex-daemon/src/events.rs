// crates/annex-daemon/src/events.rs
//
// Notices broadcast by the flywheel actor to daemon tasks.
//
// The actor publishes on a tokio broadcast channel after every transaction.
// The serve loop subscribes to log them; slow subscribers lag rather than
// block the writer.

use serde::Serialize;

use annex_core::BlockNumber;
use annex_flywheel::FlywheelEvent;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum FlywheelNotice {
    /// A transaction was applied and persisted.
    Committed {
        seq: u64,
        block: BlockNumber,
        op: String,
        events: Vec<FlywheelEvent>,
    },
    /// A transaction was refused; the state did not change.
    Rejected {
        block: BlockNumber,
        op: String,
        code: String,
        message: String,
    },
}
