//! Account domain model

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};
use crate::ports::Guard;

/// Stable, totally ordered account identifier
///
/// The ordering is the global lock order: multi-account operations always
/// acquire guards in ascending `AccountId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u32);

impl AccountId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AccountId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Point-in-time view of an account, safe to hand across threads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub balance: Decimal,
}

impl AccountSnapshot {
    pub fn new(id: AccountId, balance: Decimal) -> Self {
        Self { id, balance }
    }

    /// Sum of balances across snapshots
    pub fn total(snapshots: &[AccountSnapshot]) -> Decimal {
        snapshots.iter().map(|s| s.balance).sum()
    }
}

/// A bank account whose balance lives inside its own guard
///
/// Every balance access goes through the guard `G`; no two accounts share a
/// guard. `deposit`, `withdraw` and `balance` block until the guard is free,
/// which makes them linearizable per account. Transfers between accounts use
/// [`Account::guard`] with bounded waits instead.
pub struct Account<G> {
    id: AccountId,
    balance: G,
}

impl<G: Guard<Decimal>> Account<G> {
    /// Create an account with an initial balance
    pub fn new(id: AccountId, initial_balance: Decimal) -> Self {
        Self {
            id,
            balance: G::new(initial_balance),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Add `amount` and return the new balance
    ///
    /// An overflowing result is rejected and the balance is left as it was.
    pub fn deposit(&self, amount: Decimal) -> Result<Decimal> {
        let mut balance = self.balance.acquire();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| overflow(self.id, amount))?;
        Ok(*balance)
    }

    /// Subtract `amount` and return the new balance
    ///
    /// No overdraft check: the balance may go negative.
    pub fn withdraw(&self, amount: Decimal) -> Result<Decimal> {
        let mut balance = self.balance.acquire();
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| overflow(self.id, amount))?;
        Ok(*balance)
    }

    /// Read the balance under the guard
    pub fn balance(&self) -> Decimal {
        *self.balance.acquire()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot::new(self.id, self.balance())
    }

    /// The guard protecting this account's balance
    pub fn guard(&self) -> &G {
        &self.balance
    }
}

pub(crate) fn overflow(id: AccountId, amount: Decimal) -> Error {
    Error::validation(format!(
        "applying {} to account {} overflows its balance",
        amount, id
    ))
}

impl<G: Guard<Decimal>> fmt::Debug for Account<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("id", &self.id).finish_non_exhaustive()
    }
}
