//! Transfer service - deadlock-free two-account transfers
//!
//! Each attempt takes both account guards through
//! [`acquire_ordered`](super::lock_set::acquire_ordered), so
//! the lower account id is always locked first. A timed-out attempt has
//! already released whatever it held; the service then sleeps for a
//! backoff delay and tries again, up to `max_attempts`. Exhaustion is an
//! ordinary [`TransferOutcome::NotCompleted`], not an error.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, trace, warn};

use super::lock_set::{acquire_ordered_with, LockTimeouts};
use crate::adapters::UniformJitter;
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountId, AttemptReport, TransferOutcome, TransferPhase, TransferReceipt,
    TransferRequest,
};
use crate::ports::{BackoffPolicy, Guard};

/// Default attempt ceiling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait for the lower-id guard
pub const DEFAULT_FIRST_LOCK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default wait for the higher-id guard
pub const DEFAULT_SECOND_LOCK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Retry and timeout settings for the ordered protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub max_attempts: u32,
    pub timeouts: LockTimeouts,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeouts: LockTimeouts {
                first: DEFAULT_FIRST_LOCK_TIMEOUT,
                subsequent: DEFAULT_SECOND_LOCK_TIMEOUT,
            },
        }
    }
}

/// Tracks one attempt through the transfer state machine
struct AttemptTracker {
    attempt: u32,
    phase: TransferPhase,
}

impl AttemptTracker {
    fn new(attempt: u32) -> Self {
        Self {
            attempt,
            phase: TransferPhase::Idle,
        }
    }

    fn enter(&mut self, next: TransferPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transfer transition {} -> {}",
            self.phase,
            next
        );
        trace!(attempt = self.attempt, from = %self.phase, to = %next, "transfer phase");
        self.phase = next;
    }
}

/// Ordered-acquisition transfer service
pub struct TransferService {
    policy: TransferPolicy,
    backoff: Box<dyn BackoffPolicy>,
}

impl Default for TransferService {
    fn default() -> Self {
        Self::new(
            TransferPolicy::default(),
            Box::new(UniformJitter::new(
                Duration::from_millis(100),
                Duration::from_millis(500),
            )),
        )
    }
}

impl TransferService {
    pub fn new(policy: TransferPolicy, backoff: Box<dyn BackoffPolicy>) -> Self {
        Self { policy, backoff }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Move `amount` from `source` to `destination`
    ///
    /// Returns `Err` only for an invalid request or a balance that would
    /// overflow, in both cases with neither account changed. Contention
    /// always ends in a receipt: `Completed` with both balances updated, or
    /// `NotCompleted` with both balances exactly as they were.
    pub fn transfer<G: Guard<Decimal>>(
        &self,
        source: &Account<G>,
        destination: &Account<G>,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let request = TransferRequest::new(source.id(), destination.id(), amount)?;
        let started_at = Utc::now();
        let mut attempts = Vec::new();

        for attempt in 1..=self.policy.max_attempts {
            info!(
                transfer = %request.id,
                attempt,
                from = %request.source,
                to = %request.destination,
                "attempting transfer"
            );

            match self.try_once(&request, source, destination, attempt)? {
                AttemptResult::Completed(report) => {
                    attempts.push(report);
                    info!(
                        transfer = %request.id,
                        attempt,
                        from = %request.source,
                        to = %request.destination,
                        "transfer completed"
                    );
                    return Ok(TransferReceipt::new(
                        &request,
                        started_at,
                        TransferOutcome::Completed,
                        attempts,
                    ));
                }
                AttemptResult::TimedOut {
                    mut tracker,
                    blocked_on,
                } => {
                    warn!(
                        transfer = %request.id,
                        attempt,
                        account = %blocked_on,
                        "transfer attempt timed out"
                    );

                    // Backoff -> Idle is the next attempt's tracker starting fresh
                    let backoff_ms = if attempt < self.policy.max_attempts {
                        let delay = self.backoff.delay(attempt);
                        tracker.enter(TransferPhase::Backoff);
                        debug!(
                            transfer = %request.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            policy = self.backoff.name(),
                            "backing off"
                        );
                        thread::sleep(delay);
                        Some(delay.as_millis() as u64)
                    } else {
                        tracker.enter(TransferPhase::Failed);
                        None
                    };

                    attempts.push(AttemptReport {
                        attempt,
                        reached: tracker.phase,
                        blocked_on: Some(blocked_on),
                        backoff_ms,
                    });
                }
            }
        }

        warn!(
            transfer = %request.id,
            from = %request.source,
            to = %request.destination,
            attempts = self.policy.max_attempts,
            "transfer not completed, attempts exhausted"
        );
        Ok(TransferReceipt::new(
            &request,
            started_at,
            TransferOutcome::NotCompleted,
            attempts,
        ))
    }

    /// One pass through acquire, mutate, release
    fn try_once<G: Guard<Decimal>>(
        &self,
        request: &TransferRequest,
        source: &Account<G>,
        destination: &Account<G>,
        attempt: u32,
    ) -> Result<AttemptResult> {
        let mut tracker = AttemptTracker::new(attempt);
        let resources = [
            (source.id(), source.guard()),
            (destination.id(), destination.guard()),
        ];

        let acquired = acquire_ordered_with(&resources, self.policy.timeouts, |position, _| {
            tracker.enter(if position == 0 {
                TransferPhase::AcquiringFirst
            } else {
                TransferPhase::AcquiringSecond
            });
        });

        let mut locks = match acquired {
            Ok(locks) => locks,
            Err(Error::Contention { account, .. }) => {
                // Rollback already happened inside the lock set
                tracker.enter(TransferPhase::ReleasingHeld);
                return Ok(AttemptResult::TimedOut {
                    tracker,
                    blocked_on: account,
                });
            }
            Err(e) => return Err(e),
        };

        tracker.enter(TransferPhase::Mutating);
        {
            let (from, to) = locks.pair_mut(request.source, request.destination)?;
            // Nothing is written unless both new balances are representable
            let (debited, credited) = request.settle(*from, *to)?;
            *from = debited;
            *to = credited;
        }
        drop(locks);
        tracker.enter(TransferPhase::Released);

        Ok(AttemptResult::Completed(AttemptReport {
            attempt,
            reached: tracker.phase,
            blocked_on: None,
            backoff_ms: None,
        }))
    }
}

enum AttemptResult {
    Completed(AttemptReport),
    TimedOut {
        tracker: AttemptTracker,
        blocked_on: AccountId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChannelGuard, FixedBackoff, ParkingGuard};

    type TestAccount = Account<ParkingGuard<Decimal>>;

    fn account(id: u32, balance: i64) -> TestAccount {
        Account::new(AccountId::new(id), Decimal::from(balance))
    }

    fn fast_service(max_attempts: u32) -> TransferService {
        TransferService::new(
            TransferPolicy {
                max_attempts,
                timeouts: LockTimeouts::uniform(Duration::from_millis(40)),
            },
            Box::new(FixedBackoff(Duration::from_millis(5))),
        )
    }

    #[test]
    fn test_uncontended_transfer_completes_first_try() {
        let a = account(1, 1000);
        let b = account(2, 500);

        let receipt = fast_service(3).transfer(&a, &b, Decimal::from(100)).unwrap();
        assert!(receipt.is_completed());
        assert_eq!(receipt.attempt_count(), 1);
        assert!(receipt.attempts[0].succeeded());
        assert_eq!(a.balance(), Decimal::from(900));
        assert_eq!(b.balance(), Decimal::from(600));
    }

    #[test]
    fn test_reverse_direction_uses_same_lock_order() {
        let a = account(1, 1000);
        let b = account(2, 500);

        let receipt = fast_service(3).transfer(&b, &a, Decimal::from(100)).unwrap();
        assert!(receipt.is_completed());
        assert_eq!(a.balance(), Decimal::from(1100));
        assert_eq!(b.balance(), Decimal::from(400));
    }

    #[test]
    fn test_exhausted_retries_leave_balances_untouched() {
        let a = account(1, 1000);
        let b = account(2, 500);
        let blocker = b.guard().acquire();

        let receipt = fast_service(3).transfer(&a, &b, Decimal::from(100)).unwrap();
        assert_eq!(receipt.outcome, TransferOutcome::NotCompleted);
        assert_eq!(receipt.attempt_count(), 3);
        assert!(receipt
            .attempts
            .iter()
            .all(|r| r.blocked_on == Some(AccountId::new(2))));
        assert_eq!(receipt.attempts[0].backoff_ms, Some(5));
        assert_eq!(receipt.attempts[0].reached, TransferPhase::Backoff);
        assert_eq!(receipt.attempts[1].reached, TransferPhase::Backoff);
        assert_eq!(receipt.attempts[2].backoff_ms, None);
        assert_eq!(receipt.attempts[2].reached, TransferPhase::Failed);

        drop(blocker);
        assert_eq!(a.balance(), Decimal::from(1000));
        assert_eq!(b.balance(), Decimal::from(500));
    }

    #[test]
    fn test_blocked_lower_account_reported() {
        let a = account(1, 10);
        let b = account(2, 10);
        let _blocker = a.guard().acquire();

        let receipt = fast_service(1).transfer(&b, &a, Decimal::from(1)).unwrap();
        assert!(!receipt.is_completed());
        assert_eq!(receipt.attempts[0].blocked_on, Some(AccountId::new(1)));
    }

    #[test]
    fn test_invalid_request_is_an_error() {
        let a = account(1, 10);
        assert!(fast_service(3).transfer(&a, &a, Decimal::from(1)).is_err());

        let b = account(2, 10);
        assert!(fast_service(3).transfer(&a, &b, Decimal::ZERO).is_err());
        assert_eq!(a.balance(), Decimal::from(10));
    }

    #[test]
    fn test_works_with_channel_guards() {
        let a: Account<ChannelGuard<Decimal>> = Account::new(AccountId::new(5), Decimal::from(50));
        let b: Account<ChannelGuard<Decimal>> = Account::new(AccountId::new(3), Decimal::from(0));

        let receipt = fast_service(3).transfer(&a, &b, Decimal::new(1250, 2)).unwrap();
        assert!(receipt.is_completed());
        assert_eq!(a.balance(), Decimal::new(3750, 2));
        assert_eq!(b.balance(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_overflowing_credit_leaves_both_balances() {
        let a = account(1, 0);
        let b: TestAccount = Account::new(AccountId::new(2), Decimal::MAX);

        let err = fast_service(3).transfer(&a, &b, Decimal::ONE).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(a.balance(), Decimal::ZERO);
        assert_eq!(b.balance(), Decimal::MAX);

        // Both guards were released on the error path
        assert!(a.guard().try_acquire_for(Duration::from_millis(10)).is_some());
        assert!(b.guard().try_acquire_for(Duration::from_millis(10)).is_some());
    }

    #[test]
    fn test_default_policy_matches_documented_calibration() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeouts.first, Duration::from_millis(1500));
        assert_eq!(policy.timeouts.subsequent, Duration::from_millis(1500));
    }
}
