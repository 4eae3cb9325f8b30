//! Core domain entities
//!
//! Accounts, transfer requests and receipts. The only dependency on the
//! outside world is the [`Guard`](crate::ports::Guard) port that accounts
//! keep their balance in.

mod account;
mod transfer;
mod unguarded;
pub mod result;

pub use account::{Account, AccountId, AccountSnapshot};
pub use transfer::{AttemptReport, TransferOutcome, TransferPhase, TransferReceipt, TransferRequest};
pub use unguarded::UnguardedAccount;
