// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Explicit transaction handles for the vote store.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Buffered changes applied at commit, discarded on rollback
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::Change;
pub use state::{Transaction, TransactionId, TransactionState};
