//! snmp-credcheck: check SNMP credentials against live agents.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use snmp_credcheck::CredentialValidator;
use snmp_credcheck::cli::args::Args;
use snmp_credcheck::cli::inventory::Inventory;
use snmp_credcheck::cli::output::{write_check, write_result};
use snmp_credcheck::cli::{exit_code, run_checks};

/// Configuration error, same code as an invalid check.
const EXIT_CONFIG: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let validator = CredentialValidator::udp(args.common.engine_config(), args.validator_config());

    match &args.inventory {
        Some(path) => run_inventory(&args, &validator, path).await,
        None => run_targets(&args, &validator).await,
    }
}

async fn run_targets(args: &Args, validator: &CredentialValidator) -> ExitCode {
    let results = run_checks(validator, args.specs()).await;

    let (mut stdout, mut stderr) = (io::stdout().lock(), io::stderr().lock());
    for (target, result) in args.targets.iter().zip(&results) {
        if let Err(e) = write_result(args.output.format, target, result, &mut stdout, &mut stderr) {
            eprintln!("Error writing output: {}", e);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::from(exit_code(&results))
}

async fn run_inventory(
    args: &Args,
    validator: &CredentialValidator,
    path: &std::path::Path,
) -> ExitCode {
    let inventory = match Inventory::load(path) {
        Ok(inventory) => inventory,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let results = run_checks(validator, inventory.specs()).await;

    let (mut stdout, mut stderr) = (io::stdout().lock(), io::stderr().lock());
    let mut failed = 0usize;
    for (check, result) in inventory.checks.iter().zip(&results) {
        // checks without an expectation must be accepted
        if !check.passes(result).unwrap_or_else(|| result.is_accepted()) {
            failed += 1;
        }
        if let Err(e) = write_check(args.output.format, check, result, &mut stdout, &mut stderr) {
            eprintln!("Error writing output: {}", e);
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(target: "snmp_credcheck::cli", { checks = results.len(), failed }, "inventory finished");
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
