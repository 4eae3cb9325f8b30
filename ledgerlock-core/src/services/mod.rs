//! Service layer - locking protocols and demonstration runs
//!
//! Services work on [`Account`](crate::domain::Account)s through the
//! [`Guard`](crate::ports::Guard) port and never name a concrete primitive,
//! except the scenario runner which picks one per phase.

mod lock_set;
mod naive_transfer;
mod scenario;
mod transfer;

pub use lock_set::{acquire_ordered, acquire_ordered_with, LockTimeouts, OrderedLocks};
pub use naive_transfer::{NaiveTransferService, DEFAULT_NAIVE_LOCK_TIMEOUT, DEFAULT_PROCESSING_DELAY};
pub use scenario::{run_concurrently, Phase, ScenarioReport, ScenarioService};
pub use transfer::{
    TransferPolicy, TransferService, DEFAULT_FIRST_LOCK_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_SECOND_LOCK_TIMEOUT,
};
