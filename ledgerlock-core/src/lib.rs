//! Ledgerlock Core - guarded accounts and deadlock-free transfers
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: Accounts, transfer requests and receipts
//! - **ports**: Traits the protocols depend on (Guard, BackoffPolicy)
//! - **adapters**: Concrete guards (parking_lot mutex, token channel) and backoff policies
//! - **services**: Ordered lock sets, naive and ordered transfers, scenario runs

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;

use adapters::{ChannelGuard, ParkingGuard};
use config::Config;
use services::ScenarioService;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, AccountId, AccountSnapshot, TransferOutcome, TransferPhase, TransferReceipt,
};
pub use services::{Phase, ScenarioReport, TransferService};

/// Account guarded by a native mutex
pub type MutexAccount = Account<ParkingGuard<Decimal>>;

/// Account guarded by a token channel
pub type ChannelAccount = Account<ChannelGuard<Decimal>>;

/// Main context for ledgerlock runs
///
/// Holds the effective configuration and the services built from it.
pub struct LedgerlockContext {
    pub config: Config,
    pub scenario_service: ScenarioService,
}

impl LedgerlockContext {
    /// Create a context from the settings in `dir`
    pub fn new(dir: &Path) -> Result<Self> {
        let config = Config::load(dir)?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        let scenario_service = ScenarioService::new(config.clone());
        Self {
            config,
            scenario_service,
        }
    }
}
