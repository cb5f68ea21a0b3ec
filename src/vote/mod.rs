// ============================================================================
// Vote path: validation, the vote transaction, and result aggregation
// ============================================================================

pub mod coordinator;
pub mod results;
pub mod validator;

pub use coordinator::{RejectReason, VoteCoordinator, VoteOutcome};
pub use results::{OptionCount, PollResults, ResultsReader};
pub use validator::{Validation, VoteValidator};
