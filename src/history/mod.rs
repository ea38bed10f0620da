// ============================================================================
// History - per-order snapshot ledger for undo and rollback
// ============================================================================

pub mod ledger;
pub mod snapshot;

pub use ledger::{HistoryError, HistoryLedger, DEFAULT_HISTORY_CAP};
pub use snapshot::Snapshot;
