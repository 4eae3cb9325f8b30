//! Unsynchronized account baseline
//!
//! Each individual read and write is guarded, but a deposit or withdrawal
//! is a separate read followed by a separate write. Two callers can read the
//! same balance and the later write silently discards the earlier one.
//! Kept only as the contrast case for [`Account`](super::Account).

use std::thread;

use rust_decimal::Decimal;

use super::account::{overflow, AccountId, AccountSnapshot};
use super::result::Result;
use crate::ports::Guard;

/// Account whose read-modify-write is not atomic
pub struct UnguardedAccount<G> {
    id: AccountId,
    cell: G,
}

impl<G: Guard<Decimal>> UnguardedAccount<G> {
    pub fn new(id: AccountId, initial_balance: Decimal) -> Self {
        Self {
            id,
            cell: G::new(initial_balance),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn deposit(&self, amount: Decimal) -> Result<()> {
        let current = self.read();
        // Widen the window between read and write so races show up
        thread::yield_now();
        let next = current
            .checked_add(amount)
            .ok_or_else(|| overflow(self.id, amount))?;
        self.write(next);
        Ok(())
    }

    pub fn withdraw(&self, amount: Decimal) -> Result<()> {
        let current = self.read();
        thread::yield_now();
        let next = current
            .checked_sub(amount)
            .ok_or_else(|| overflow(self.id, amount))?;
        self.write(next);
        Ok(())
    }

    pub fn balance(&self) -> Decimal {
        self.read()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot::new(self.id, self.read())
    }

    fn read(&self) -> Decimal {
        *self.cell.acquire()
    }

    fn write(&self, value: Decimal) {
        *self.cell.acquire() = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ParkingGuard;

    #[test]
    fn test_single_threaded_use_is_correct() {
        let account: UnguardedAccount<ParkingGuard<Decimal>> =
            UnguardedAccount::new(AccountId::new(1), Decimal::from(1000));
        account.withdraw(Decimal::from(100)).unwrap();
        account.deposit(Decimal::from(50)).unwrap();
        assert_eq!(account.balance(), Decimal::from(950));
        assert_eq!(account.snapshot().id, AccountId::new(1));
    }
}
