//! Naive transfer - lock the source, then the destination
//!
//! The source guard is held while waiting for the destination guard. Two
//! opposite transfers (1→2 and 2→1) each take their own source and then
//! wait on each other. The bounded wait turns that deadlock into a timeout
//! for at least one side, but nothing is retried, so under sustained
//! contention this variant may never complete. That limitation is what
//! [`TransferService`](super::TransferService) fixes.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::result::Result;
use crate::domain::{
    Account, AccountId, AttemptReport, TransferOutcome, TransferPhase, TransferReceipt,
    TransferRequest,
};
use crate::ports::Guard;

/// Default wait for either guard
pub const DEFAULT_NAIVE_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default simulated work between the two acquisitions
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(100);

/// Single-attempt, source-first transfer
#[derive(Debug, Clone, Copy)]
pub struct NaiveTransferService {
    lock_timeout: Duration,
    processing_delay: Duration,
}

impl Default for NaiveTransferService {
    fn default() -> Self {
        Self::new(DEFAULT_NAIVE_LOCK_TIMEOUT, DEFAULT_PROCESSING_DELAY)
    }
}

impl NaiveTransferService {
    pub fn new(lock_timeout: Duration, processing_delay: Duration) -> Self {
        Self {
            lock_timeout,
            processing_delay,
        }
    }

    pub fn transfer<G: Guard<Decimal>>(
        &self,
        source: &Account<G>,
        destination: &Account<G>,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let request = TransferRequest::new(source.id(), destination.id(), amount)?;
        let started_at = Utc::now();

        info!(transfer = %request.id, account = %source.id(), "locking source account");
        let Some(mut from) = source.guard().try_acquire_for(self.lock_timeout) else {
            warn!(
                transfer = %request.id,
                account = %source.id(),
                "failed to lock source account, possible deadlock"
            );
            return Ok(not_completed(&request, started_at, source.id()));
        };

        thread::sleep(self.processing_delay);

        info!(transfer = %request.id, account = %destination.id(), "locking destination account");
        let Some(mut to) = destination.guard().try_acquire_for(self.lock_timeout) else {
            drop(from);
            warn!(
                transfer = %request.id,
                account = %destination.id(),
                "failed to lock destination account, possible deadlock"
            );
            return Ok(not_completed(&request, started_at, destination.id()));
        };

        let (debited, credited) = request.settle(*from, *to)?;
        *from = debited;
        *to = credited;
        drop(to);
        drop(from);

        info!(
            transfer = %request.id,
            from = %request.source,
            to = %request.destination,
            "transfer completed"
        );
        Ok(TransferReceipt::new(
            &request,
            started_at,
            TransferOutcome::Completed,
            vec![AttemptReport {
                attempt: 1,
                reached: TransferPhase::Released,
                blocked_on: None,
                backoff_ms: None,
            }],
        ))
    }
}

/// Single failed attempt; nothing was mutated
fn not_completed(
    request: &TransferRequest,
    started_at: DateTime<Utc>,
    blocked_on: AccountId,
) -> TransferReceipt {
    TransferReceipt::new(
        request,
        started_at,
        TransferOutcome::NotCompleted,
        vec![AttemptReport {
            attempt: 1,
            reached: TransferPhase::Failed,
            blocked_on: Some(blocked_on),
            backoff_ms: None,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    use crate::adapters::ParkingGuard;
    use crate::domain::AccountSnapshot;

    type TestAccount = Account<ParkingGuard<Decimal>>;

    fn account(id: u32, balance: i64) -> TestAccount {
        Account::new(AccountId::new(id), Decimal::from(balance))
    }

    fn fast() -> NaiveTransferService {
        NaiveTransferService::new(Duration::from_millis(50), Duration::ZERO)
    }

    #[test]
    fn test_uncontended_transfer_completes() {
        let a = account(1, 1000);
        let b = account(2, 1000);

        let receipt = fast().transfer(&a, &b, Decimal::from(100)).unwrap();
        assert!(receipt.is_completed());
        assert_eq!(a.balance(), Decimal::from(900));
        assert_eq!(b.balance(), Decimal::from(1100));
    }

    #[test]
    fn test_busy_destination_releases_source() {
        let a = account(1, 1000);
        let b = account(2, 1000);
        let blocker = b.guard().acquire();

        let receipt = fast().transfer(&a, &b, Decimal::from(100)).unwrap();
        assert_eq!(receipt.outcome, TransferOutcome::NotCompleted);
        assert_eq!(receipt.attempt_count(), 1);
        assert_eq!(receipt.attempts[0].blocked_on, Some(AccountId::new(2)));

        // Source guard was given back on the failure path
        assert!(a.guard().try_acquire_for(Duration::from_millis(10)).is_some());
        drop(blocker);
        assert_eq!(a.balance(), Decimal::from(1000));
        assert_eq!(b.balance(), Decimal::from(1000));
    }

    #[test]
    fn test_busy_source_reported() {
        let a = account(1, 1000);
        let b = account(2, 1000);
        let _blocker = a.guard().acquire();

        let receipt = fast().transfer(&a, &b, Decimal::from(100)).unwrap();
        assert!(!receipt.is_completed());
        assert_eq!(receipt.attempts[0].blocked_on, Some(AccountId::new(1)));
    }

    #[test]
    fn test_overflowing_credit_leaves_both_balances() {
        let a = account(1, 0);
        let b: TestAccount = Account::new(AccountId::new(2), Decimal::MAX);

        assert!(fast().transfer(&a, &b, Decimal::ONE).is_err());
        assert_eq!(a.balance(), Decimal::ZERO);
        assert_eq!(b.balance(), Decimal::MAX);
    }

    #[test]
    fn test_opposite_transfers_leave_consistent_balances() {
        let a = account(1, 1000);
        let b = account(2, 1000);
        let service =
            NaiveTransferService::new(Duration::from_millis(200), Duration::from_millis(100));
        let barrier = Barrier::new(2);

        let (forward, reverse) = std::thread::scope(|s| {
            let forward = s.spawn(|| {
                barrier.wait();
                service.transfer(&a, &b, Decimal::from(100)).unwrap()
            });
            let reverse = s.spawn(|| {
                barrier.wait();
                service.transfer(&b, &a, Decimal::from(100)).unwrap()
            });
            (forward.join().unwrap(), reverse.join().unwrap())
        });

        let mut expected = vec![
            AccountSnapshot::new(AccountId::new(1), Decimal::from(1000)),
            AccountSnapshot::new(AccountId::new(2), Decimal::from(1000)),
        ];
        forward.apply_to(&mut expected);
        reverse.apply_to(&mut expected);
        assert_eq!(vec![a.snapshot(), b.snapshot()], expected);
        assert_eq!(a.balance() + b.balance(), Decimal::from(2000));
    }
}
