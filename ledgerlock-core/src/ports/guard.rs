//! Guard port - exclusive access with bounded waiting

use std::ops::DerefMut;
use std::time::Duration;

/// Exclusive-access guard around a value
///
/// A guard owns the protected value. Access is only possible through a
/// `Held` handle, which releases the guard when dropped, so every exit path
/// (including early returns after a timeout) gives the value back.
///
/// Guards are not reentrant: acquiring a guard already held by the calling
/// thread blocks until the timeout expires.
pub trait Guard<T>: Send + Sync {
    /// Scoped handle proving the guard is held
    type Held<'a>: DerefMut<Target = T>
    where
        Self: 'a;

    /// Wrap a value in a new, unheld guard
    fn new(value: T) -> Self
    where
        Self: Sized;

    /// Block until the guard is available
    fn acquire(&self) -> Self::Held<'_>;

    /// Wait at most `timeout` for the guard; `None` if it stayed busy
    fn try_acquire_for(&self, timeout: Duration) -> Option<Self::Held<'_>>;
}
