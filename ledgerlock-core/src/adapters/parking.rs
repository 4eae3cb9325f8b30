//! Native mutex guard backed by `parking_lot`

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::ports::Guard;

/// Guard over a `parking_lot::Mutex`, which supports timed locking
#[derive(Debug, Default)]
pub struct ParkingGuard<T> {
    inner: Mutex<T>,
}

impl<T: Send> Guard<T> for ParkingGuard<T> {
    type Held<'a> = MutexGuard<'a, T> where Self: 'a;

    fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    fn acquire(&self) -> Self::Held<'_> {
        self.inner.lock()
    }

    fn try_acquire_for(&self, timeout: Duration) -> Option<Self::Held<'_>> {
        self.inner.try_lock_for(timeout)
    }
}
