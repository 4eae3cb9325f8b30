//! Transfer domain model

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::{AccountId, AccountSnapshot};
use super::result::{Error, Result};

/// A validated request to move `amount` from `source` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: Uuid,
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Decimal,
}

impl TransferRequest {
    /// Validate and create a request
    ///
    /// Source and destination must differ (guards are not reentrant) and
    /// the amount must be positive.
    pub fn new(source: AccountId, destination: AccountId, amount: Decimal) -> Result<Self> {
        if source == destination {
            return Err(Error::validation(format!(
                "cannot transfer from account {} to itself",
                source
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            destination,
            amount,
        })
    }

    /// Guard acquisition order: lower id first, whatever the direction
    pub fn lock_order(&self) -> (AccountId, AccountId) {
        if self.source < self.destination {
            (self.source, self.destination)
        } else {
            (self.destination, self.source)
        }
    }

    /// New `(source, destination)` balances, or an error if either overflows
    ///
    /// Both results are computed before anything is written back, so a
    /// caller that assigns only on `Ok` never applies half a transfer.
    pub fn settle(
        &self,
        source_balance: Decimal,
        destination_balance: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        let debited = source_balance.checked_sub(self.amount).ok_or_else(|| {
            Error::validation(format!(
                "debiting {} from account {} overflows its balance",
                self.amount, self.source
            ))
        })?;
        let credited = destination_balance.checked_add(self.amount).ok_or_else(|| {
            Error::validation(format!(
                "crediting {} to account {} overflows its balance",
                self.amount, self.destination
            ))
        })?;
        Ok((debited, credited))
    }
}

/// Where a single transfer attempt is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Idle,
    AcquiringFirst,
    AcquiringSecond,
    Mutating,
    Released,
    ReleasingHeld,
    Backoff,
    Failed,
}

impl TransferPhase {
    /// Allowed moves of the per-attempt state machine
    pub fn can_transition_to(self, next: TransferPhase) -> bool {
        use TransferPhase::*;
        matches!(
            (self, next),
            (Idle, AcquiringFirst)
                | (AcquiringFirst, AcquiringSecond)
                | (AcquiringFirst, ReleasingHeld)
                | (AcquiringSecond, Mutating)
                | (AcquiringSecond, ReleasingHeld)
                | (Mutating, Released)
                | (ReleasingHeld, Backoff)
                | (ReleasingHeld, Failed)
                | (Backoff, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferPhase::Released | TransferPhase::Failed)
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferPhase::Idle => "idle",
            TransferPhase::AcquiringFirst => "acquiring first",
            TransferPhase::AcquiringSecond => "acquiring second",
            TransferPhase::Mutating => "mutating",
            TransferPhase::Released => "released",
            TransferPhase::ReleasingHeld => "releasing held",
            TransferPhase::Backoff => "backoff",
            TransferPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final result of a transfer call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Completed,
    /// Every attempt timed out; neither balance was touched
    NotCompleted,
}

/// Progress notification for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptReport {
    /// 1-based attempt number
    pub attempt: u32,
    /// Last phase this attempt entered: `Released`, `Backoff` or `Failed`
    pub reached: TransferPhase,
    /// Account whose guard timed out, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_on: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

impl AttemptReport {
    pub fn succeeded(&self) -> bool {
        self.blocked_on.is_none() && self.reached == TransferPhase::Released
    }
}

/// What a caller gets back from a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: Uuid,
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Decimal,
    pub started_at: DateTime<Utc>,
    pub outcome: TransferOutcome,
    pub attempts: Vec<AttemptReport>,
}

impl TransferReceipt {
    pub fn new(
        request: &TransferRequest,
        started_at: DateTime<Utc>,
        outcome: TransferOutcome,
        attempts: Vec<AttemptReport>,
    ) -> Self {
        Self {
            id: request.id,
            source: request.source,
            destination: request.destination,
            amount: request.amount,
            started_at,
            outcome,
            attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == TransferOutcome::Completed
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Apply this receipt to a set of snapshots (no-op unless completed)
    pub fn apply_to(&self, snapshots: &mut [AccountSnapshot]) {
        if !self.is_completed() {
            return;
        }
        for snapshot in snapshots.iter_mut() {
            if snapshot.id == self.source {
                snapshot.balance -= self.amount;
            } else if snapshot.id == self.destination {
                snapshot.balance += self.amount;
            }
        }
    }
}
