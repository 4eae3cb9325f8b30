//! Channel-based guard
//!
//! The protected value is the only message in a capacity-1 channel.
//! Acquiring receives it, releasing sends it back. Whoever holds the value
//! holds the guard, so no lock primitive or unsafe cell is involved.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::ports::Guard;

/// Guard that passes its value around as a token
pub struct ChannelGuard<T> {
    slot: Sender<T>,
    token: Receiver<T>,
}

/// Held token; sends the value back on drop
pub struct ChannelHeld<'a, T> {
    value: Option<T>,
    slot: &'a Sender<T>,
}

impl<T: Send> Guard<T> for ChannelGuard<T> {
    type Held<'a> = ChannelHeld<'a, T> where Self: 'a;

    fn new(value: T) -> Self {
        let (slot, token) = bounded(1);
        // Fresh channel: empty and connected, the send cannot fail
        let _ = slot.try_send(value);
        Self { slot, token }
    }

    fn acquire(&self) -> Self::Held<'_> {
        // The guard owns a sender, so the channel never disconnects
        let value = self
            .token
            .recv()
            .expect("channel guard lost its own sender");
        ChannelHeld {
            value: Some(value),
            slot: &self.slot,
        }
    }

    fn try_acquire_for(&self, timeout: Duration) -> Option<Self::Held<'_>> {
        let value = self.token.recv_timeout(timeout).ok()?;
        Some(ChannelHeld {
            value: Some(value),
            slot: &self.slot,
        })
    }
}

impl<T> Deref for ChannelHeld<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("token present until drop")
    }
}

impl<T> DerefMut for ChannelHeld<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("token present until drop")
    }
}

impl<T> Drop for ChannelHeld<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            // Capacity is 1 and we hold the only token: never blocks
            let _ = self.slot.send(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_and_mutate() {
        let guard = ChannelGuard::new(String::from("a"));
        guard.acquire().push('b');
        assert_eq!(*guard.acquire(), "ab");
    }

    #[test]
    fn test_try_acquire_times_out_while_held() {
        let guard = ChannelGuard::new(1u64);
        let held = guard.acquire();
        assert!(guard.try_acquire_for(Duration::from_millis(30)).is_none());
        drop(held);
        assert!(guard.try_acquire_for(Duration::from_millis(30)).is_some());
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let guard = Arc::new(ChannelGuard::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *guard.acquire() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*guard.acquire(), 8000);
    }
}
