//! Scenario service - the demonstration runs
//!
//! Each phase spawns a fixed set of concurrent callers, joins them all, and
//! reports the final balances next to the balances a correct run must end
//! with.

use std::fmt;
use std::str::FromStr;
use std::sync::Barrier;
use std::thread;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::naive_transfer::NaiveTransferService;
use super::transfer::TransferService;
use crate::adapters::{ChannelGuard, ParkingGuard};
use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountId, AccountSnapshot, TransferReceipt, UnguardedAccount};
use crate::ports::Guard;

const WITHDRAW_AMOUNT: i64 = 100;
const DEPOSIT_AMOUNT: i64 = 50;
const TRANSFER_AMOUNT: i64 = 100;

/// Demonstration selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Unguarded read-modify-write, may lose updates
    Race,
    /// Single-guard account on a native mutex
    Phase1,
    /// Single-guard account on a channel guard
    Phase2,
    /// Naive source-first transfers in opposite directions
    Phase3,
    /// Ordered transfers with retry and backoff
    Phase4,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Race,
        Phase::Phase1,
        Phase::Phase2,
        Phase::Phase3,
        Phase::Phase4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Race => "race",
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
            Phase::Phase4 => "phase4",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::Race => "Unsynchronized account (lost updates possible)",
            Phase::Phase1 => "Guarded account, native mutex",
            Phase::Phase2 => "Guarded account, channel guard",
            Phase::Phase3 => "Naive transfers (deadlock-prone)",
            Phase::Phase4 => "Ordered transfers with retry",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "race" | "phase0" => Ok(Phase::Race),
            "phase1" => Ok(Phase::Phase1),
            "phase2" => Ok(Phase::Phase2),
            "phase3" => Ok(Phase::Phase3),
            "phase4" => Ok(Phase::Phase4),
            other => Err(Error::validation(format!(
                "invalid phase {:?}, choose from race, phase1, phase2, phase3, phase4",
                other
            ))),
        }
    }
}

/// Outcome of one demonstration run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub phase: Phase,
    pub description: String,
    pub workers: usize,
    pub initial: Vec<AccountSnapshot>,
    pub expected: Vec<AccountSnapshot>,
    pub actual: Vec<AccountSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transfers: Vec<TransferReceipt>,
}

impl ScenarioReport {
    /// Final balances equal what a correct run must produce
    pub fn is_consistent(&self) -> bool {
        self.expected == self.actual
    }

    pub fn initial_total(&self) -> Decimal {
        AccountSnapshot::total(&self.initial)
    }

    pub fn actual_total(&self) -> Decimal {
        AccountSnapshot::total(&self.actual)
    }

    pub fn completed_transfers(&self) -> usize {
        self.transfers.iter().filter(|r| r.is_completed()).count()
    }
}

/// Runs demonstration phases with the configured services
pub struct ScenarioService {
    config: Config,
    transfer_service: TransferService,
    naive_service: NaiveTransferService,
}

impl ScenarioService {
    pub fn new(config: Config) -> Self {
        let transfer_service =
            TransferService::new(config.transfer_policy(), config.backoff_policy());
        let naive_service = config.naive_service();
        Self {
            config,
            transfer_service,
            naive_service,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, phase: Phase) -> Result<ScenarioReport> {
        info!(phase = %phase, workers = self.config.workers, "running scenario");
        let report = match phase {
            Phase::Race => self.run_race(),
            Phase::Phase1 => self.run_guarded::<ParkingGuard<Decimal>>(Phase::Phase1, 1000),
            Phase::Phase2 => self.run_guarded::<ChannelGuard<Decimal>>(Phase::Phase2, 500),
            Phase::Phase3 => self.run_naive_transfers(),
            Phase::Phase4 => self.run_ordered_transfers(),
        }?;

        if report.is_consistent() {
            info!(phase = %phase, total = %report.actual_total(), "scenario consistent");
        } else {
            warn!(phase = %phase, total = %report.actual_total(), "scenario ended inconsistent");
        }
        Ok(report)
    }

    pub fn run_all(&self) -> Result<Vec<ScenarioReport>> {
        Phase::ALL.iter().map(|phase| self.run(*phase)).collect()
    }

    fn run_race(&self) -> Result<ScenarioReport> {
        let account: UnguardedAccount<ParkingGuard<Decimal>> =
            UnguardedAccount::new(AccountId::new(1), Decimal::from(1000));
        let initial = vec![account.snapshot()];

        run_concurrently(self.config.workers, |_| -> Result<()> {
            account.withdraw(Decimal::from(WITHDRAW_AMOUNT))?;
            account.deposit(Decimal::from(DEPOSIT_AMOUNT))?;
            Ok(())
        })?
        .into_iter()
        .collect::<Result<()>>()?;

        Ok(self.report(
            Phase::Race,
            initial.clone(),
            self.expected_after_workers(&initial),
            vec![account.snapshot()],
            Vec::new(),
        ))
    }

    fn run_guarded<G: Guard<Decimal>>(
        &self,
        phase: Phase,
        opening_balance: i64,
    ) -> Result<ScenarioReport> {
        let account: Account<G> = Account::new(AccountId::new(1), Decimal::from(opening_balance));
        let initial = vec![account.snapshot()];

        run_concurrently(self.config.workers, |_| -> Result<()> {
            account.withdraw(Decimal::from(WITHDRAW_AMOUNT))?;
            account.deposit(Decimal::from(DEPOSIT_AMOUNT))?;
            Ok(())
        })?
        .into_iter()
        .collect::<Result<()>>()?;

        Ok(self.report(
            phase,
            initial.clone(),
            self.expected_after_workers(&initial),
            vec![account.snapshot()],
            Vec::new(),
        ))
    }

    fn run_naive_transfers(&self) -> Result<ScenarioReport> {
        let first: Account<ParkingGuard<Decimal>> =
            Account::new(AccountId::new(1), Decimal::from(1000));
        let second: Account<ParkingGuard<Decimal>> =
            Account::new(AccountId::new(2), Decimal::from(1000));

        self.run_opposite_transfers(Phase::Phase3, &first, &second, |from, to| {
            self.naive_service
                .transfer(from, to, Decimal::from(TRANSFER_AMOUNT))
        })
    }

    fn run_ordered_transfers(&self) -> Result<ScenarioReport> {
        let first: Account<ParkingGuard<Decimal>> =
            Account::new(AccountId::new(1), Decimal::from(1000));
        let second: Account<ParkingGuard<Decimal>> =
            Account::new(AccountId::new(2), Decimal::from(500));

        self.run_opposite_transfers(Phase::Phase4, &first, &second, |from, to| {
            self.transfer_service
                .transfer(from, to, Decimal::from(TRANSFER_AMOUNT))
        })
    }

    /// Start `first → second` and `second → first` together
    fn run_opposite_transfers<G, F>(
        &self,
        phase: Phase,
        first: &Account<G>,
        second: &Account<G>,
        transfer: F,
    ) -> Result<ScenarioReport>
    where
        G: Guard<Decimal>,
        F: Fn(&Account<G>, &Account<G>) -> Result<TransferReceipt> + Sync,
    {
        let initial = vec![first.snapshot(), second.snapshot()];
        let barrier = Barrier::new(2);

        let receipts = run_concurrently(2, |caller| {
            barrier.wait();
            if caller == 0 {
                transfer(first, second)
            } else {
                transfer(second, first)
            }
        })?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let mut expected = initial.clone();
        for receipt in &receipts {
            receipt.apply_to(&mut expected);
        }

        let mut report = self.report(
            phase,
            initial,
            expected,
            vec![first.snapshot(), second.snapshot()],
            receipts,
        );
        report.workers = 2;
        Ok(report)
    }

    /// Balances after every worker withdrew then deposited once
    fn expected_after_workers(&self, initial: &[AccountSnapshot]) -> Vec<AccountSnapshot> {
        let net =
            Decimal::from(DEPOSIT_AMOUNT - WITHDRAW_AMOUNT) * Decimal::from(self.config.workers);
        initial
            .iter()
            .map(|s| AccountSnapshot::new(s.id, s.balance + net))
            .collect()
    }

    fn report(
        &self,
        phase: Phase,
        initial: Vec<AccountSnapshot>,
        expected: Vec<AccountSnapshot>,
        actual: Vec<AccountSnapshot>,
        transfers: Vec<TransferReceipt>,
    ) -> ScenarioReport {
        ScenarioReport {
            phase,
            description: phase.description().to_string(),
            workers: self.config.workers,
            initial,
            expected,
            actual,
            transfers,
        }
    }
}

/// Spawn `workers` scoped threads running `op(index)` and join them all
pub fn run_concurrently<R, F>(workers: usize, op: F) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(usize) -> R + Sync,
{
    thread::scope(|scope| {
        let op = &op;
        let handles: Vec<_> = (0..workers)
            .map(|index| scope.spawn(move || op(index)))
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                handle
                    .join()
                    .map_err(|_| Error::WorkerPanicked(format!("worker {}", index)))
            })
            .collect()
    })
}
