// crates/annex-store/src/lib.rs
//
// annex-store: Storage layer for the Annex reward flywheel.
//
// Persists the latest comptroller snapshot and an append-only log of
// transaction receipts. RocksDB backs the daemon; an in-memory store backs
// tests and dry runs.

pub mod memory;
pub mod receipt;
pub mod rocks;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::MemoryStore;
pub use receipt::StoredReceipt;
pub use rocks::RocksStore;
pub use traits::FlywheelStore;
