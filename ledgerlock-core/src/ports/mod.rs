//! Port definitions (hexagonal architecture)
//!
//! Ports define the capabilities the transfer protocol depends on. Accounts
//! and services are generic over these traits, not over a concrete mutex or
//! random source.

mod backoff;
mod guard;

pub use backoff::BackoffPolicy;
pub use guard::Guard;
