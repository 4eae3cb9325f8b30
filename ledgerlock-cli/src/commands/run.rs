//! Run command - execute one or all demonstration phases

use std::collections::HashMap;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;

use ledgerlock_core::domain::TransferOutcome;
use ledgerlock_core::{AccountSnapshot, LedgerlockContext, OperationResult, Phase, ScenarioReport};

use super::get_context;
use crate::output::{create_table, format_ms, success, warning};

/// Phase selector on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    /// Unsynchronized account
    #[value(alias = "phase0")]
    Race,
    /// Guarded account, native mutex
    Phase1,
    /// Guarded account, channel guard
    Phase2,
    /// Naive transfers
    Phase3,
    /// Ordered transfers with retry
    Phase4,
    /// Every phase in order
    All,
}

impl PhaseArg {
    fn phases(self) -> Vec<Phase> {
        match self {
            PhaseArg::Race => vec![Phase::Race],
            PhaseArg::Phase1 => vec![Phase::Phase1],
            PhaseArg::Phase2 => vec![Phase::Phase2],
            PhaseArg::Phase3 => vec![Phase::Phase3],
            PhaseArg::Phase4 => vec![Phase::Phase4],
            PhaseArg::All => Phase::ALL.to_vec(),
        }
    }
}

pub fn run(phase: PhaseArg, workers: Option<usize>, json: bool) -> Result<()> {
    let mut ctx = get_context()?;

    if let Some(workers) = workers {
        let mut config = ctx.config.clone();
        config.workers = workers;
        config.validate()?;
        ctx = LedgerlockContext::with_config(config);
    }

    let reports = match phase
        .phases()
        .into_iter()
        .map(|p| ctx.scenario_service.run(p))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(reports) => reports,
        Err(e) => {
            if json {
                let result: OperationResult<Vec<ScenarioReport>> =
                    OperationResult::fail(e.to_string());
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            return Err(e.into());
        }
    };

    if json {
        let mut context = HashMap::new();
        context.insert("config".to_string(), ctx.config.to_json());
        let result = OperationResult::ok_with_context(reports, context);
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for (index, report) in reports.iter().enumerate() {
        if index > 0 {
            println!();
        }
        print_report(report);
    }

    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!(
        "{} {}",
        format!("[{}]", report.phase).bold(),
        report.description
    );
    println!("Workers: {}", report.workers);
    println!();

    let mut table = create_table();
    table.set_header(vec!["Account", "Initial", "Expected", "Actual"]);
    for ((initial, expected), actual) in report
        .initial
        .iter()
        .zip(&report.expected)
        .zip(&report.actual)
    {
        table.add_row(vec![
            initial.id.to_string(),
            initial.balance.to_string(),
            expected.balance.to_string(),
            actual.balance.to_string(),
        ]);
    }
    println!("{}", table);

    if !report.transfers.is_empty() {
        print_transfers(report);
    }

    if report.is_consistent() {
        success(&format!(
            "Consistent: total {} (started at {})",
            report.actual_total(),
            report.initial_total()
        ));
    } else if report.phase == Phase::Race {
        warning(&format!(
            "Lost updates: expected {}, ended with {}",
            AccountSnapshot::total(&report.expected),
            report.actual_total()
        ));
    } else {
        warning(&format!(
            "Inconsistent: expected {}, ended with {}",
            AccountSnapshot::total(&report.expected),
            report.actual_total()
        ));
    }
}

fn print_transfers(report: &ScenarioReport) {
    println!();
    println!(
        "{} ({} of {} completed)",
        "Transfers".bold(),
        report.completed_transfers(),
        report.transfers.len()
    );

    let mut table = create_table();
    table.set_header(vec![
        "From", "To", "Amount", "Outcome", "Attempt", "Reached", "Blocked on", "Backoff",
    ]);
    for receipt in &report.transfers {
        let outcome = match receipt.outcome {
            TransferOutcome::Completed => "completed".green().to_string(),
            TransferOutcome::NotCompleted => "not completed".red().to_string(),
        };
        for (row, attempt) in receipt.attempts.iter().enumerate() {
            let lead = if row == 0 {
                [
                    receipt.source.to_string(),
                    receipt.destination.to_string(),
                    receipt.amount.to_string(),
                    outcome.clone(),
                ]
            } else {
                Default::default()
            };
            let mut cells = lead.to_vec();
            cells.extend([
                attempt.attempt.to_string(),
                attempt.reached.to_string(),
                attempt
                    .blocked_on
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                format_ms(attempt.backoff_ms),
            ]);
            table.add_row(cells);
        }
    }
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_every_phase() {
        assert_eq!(PhaseArg::All.phases(), Phase::ALL.to_vec());
        assert_eq!(PhaseArg::Phase2.phases(), vec![Phase::Phase2]);
    }
}
