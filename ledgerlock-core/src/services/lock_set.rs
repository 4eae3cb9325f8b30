//! Ordered multi-guard acquisition
//!
//! Every caller that needs more than one guard goes through
//! [`acquire_ordered`]. Guards are taken in ascending [`AccountId`] order no
//! matter how the caller listed them, so two lock sets over the same
//! accounts can never wait on each other in a cycle.

use std::marker::PhantomData;
use std::time::Duration;

use tracing::{debug, trace};

use crate::domain::result::{Error, Result};
use crate::domain::AccountId;
use crate::ports::Guard;

/// Per-position wait bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeouts {
    /// Bound for the lowest-keyed guard
    pub first: Duration,
    /// Bound for every guard after the first
    pub subsequent: Duration,
}

impl LockTimeouts {
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            first: timeout,
            subsequent: timeout,
        }
    }

    fn for_position(&self, position: usize) -> Duration {
        if position == 0 {
            self.first
        } else {
            self.subsequent
        }
    }
}

/// A set of held guards, released in reverse acquisition order on drop
pub struct OrderedLocks<'a, T, G>
where
    G: Guard<T> + 'a,
{
    held: Vec<(AccountId, G::Held<'a>)>,
    _value: PhantomData<fn() -> T>,
}

impl<'a, T, G> OrderedLocks<'a, T, G>
where
    G: Guard<T> + 'a,
{
    /// Keys in the order they were acquired
    pub fn keys(&self) -> Vec<AccountId> {
        self.held.iter().map(|(key, _)| *key).collect()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn get_mut(&mut self, key: AccountId) -> Option<&mut T> {
        self.held
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, held)| &mut **held)
    }

    /// Mutable access to two distinct held values at once
    pub fn pair_mut(&mut self, a: AccountId, b: AccountId) -> Result<(&mut T, &mut T)> {
        let mut first = None;
        let mut second = None;
        for (key, held) in self.held.iter_mut() {
            if *key == a {
                first = Some(&mut **held);
            } else if *key == b {
                second = Some(&mut **held);
            }
        }
        match (first, second) {
            (Some(first), Some(second)) => Ok((first, second)),
            (None, _) => Err(Error::LockNotHeld(a)),
            (_, None) => Err(Error::LockNotHeld(b)),
        }
    }
}

impl<'a, T, G> Drop for OrderedLocks<'a, T, G>
where
    G: Guard<T> + 'a,
{
    fn drop(&mut self) {
        while let Some((key, held)) = self.held.pop() {
            drop(held);
            trace!(account = %key, "released guard");
        }
    }
}

/// Acquire every guard in ascending key order, or none of them
pub fn acquire_ordered<'a, T, G>(
    resources: &[(AccountId, &'a G)],
    timeouts: LockTimeouts,
) -> Result<OrderedLocks<'a, T, G>>
where
    G: Guard<T> + 'a,
{
    acquire_ordered_with(resources, timeouts, |_, _| {})
}

/// Like [`acquire_ordered`], calling `before_acquire(position, key)` ahead
/// of each wait
///
/// On a timeout every guard already taken is released (newest first)
/// before the `Contention` error is returned.
pub fn acquire_ordered_with<'a, T, G, F>(
    resources: &[(AccountId, &'a G)],
    timeouts: LockTimeouts,
    mut before_acquire: F,
) -> Result<OrderedLocks<'a, T, G>>
where
    G: Guard<T> + 'a,
    F: FnMut(usize, AccountId),
{
    let mut ordered: Vec<(AccountId, &'a G)> = resources.to_vec();
    ordered.sort_by_key(|(key, _)| *key);

    if let Some(pair) = ordered.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(Error::DuplicateLock(pair[0].0));
    }

    let mut locks = OrderedLocks {
        held: Vec::with_capacity(ordered.len()),
        _value: PhantomData,
    };

    for (position, (key, guard)) in ordered.into_iter().enumerate() {
        let timeout = timeouts.for_position(position);
        before_acquire(position, key);
        match guard.try_acquire_for(timeout) {
            Some(held) => {
                trace!(account = %key, position, "acquired guard");
                locks.held.push((key, held));
            }
            None => {
                debug!(
                    account = %key,
                    position,
                    held = locks.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "guard busy, rolling back lock set"
                );
                return Err(Error::Contention {
                    account: key,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    Ok(locks)
}
