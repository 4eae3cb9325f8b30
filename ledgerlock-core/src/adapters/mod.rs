//! Adapters - concrete implementations of ports
//!
//! Two guard primitives (a native timed mutex and a token channel) and the
//! backoff policies injected into the transfer protocol.

pub mod backoff;
pub mod channel;
pub mod parking;

pub use backoff::{ExponentialJitter, FixedBackoff, UniformJitter};
pub use channel::ChannelGuard;
pub use parking::ParkingGuard;
