// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # peerpool
//!
//! Entry point for the `peerpool` binary. Parses CLI arguments, initializes
//! logging, loads the deployment from the data directory, runs one
//! operation, prints what it produced, and saves the deployment back.
//!
//! Results go to stdout as JSON: one line per emitted protocol event for
//! mutating commands, a pretty-printed record for `show-*` queries. Logs go
//! to stderr.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::json;

use peerpool_contracts::{Deployment, PoolConfig};
use peerpool_protocol::storage::PoolDB;
use peerpool_protocol::{Address, ManualClock, SharedClock, SystemClock, Timestamp, TokenLedger};

use cli::{Commands, PeerpoolCli};
use logging::LogFormat;

const DEFAULT_LOG_FILTER: &str = "peerpool_contracts=info,peerpool_protocol=info";

fn main() -> Result<()> {
    let cli = PeerpoolCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&cli.log_format));

    let clock: SharedClock = match cli.now {
        Some(at) => Arc::new(ManualClock::new(at)),
        None => Arc::new(SystemClock),
    };

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Init(args) => init_deployment(&cli.data_dir, args, clock),
        command => {
            let db = open_db(&cli.data_dir)?;
            let mut deployment = Deployment::load(&db, clock)
                .context("failed to load deployment")?
                .ok_or_else(|| {
                    anyhow!(
                        "no deployment in {}; run `peerpool init` first",
                        cli.data_dir.display()
                    )
                })?;

            // A failed repayment may still commit a lazy default, which
            // shows up as an event and has to be saved with the error.
            let outcome = execute(&mut deployment, command);
            let events = deployment.events().drain();
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            if matches!(outcome, Ok(true)) || !events.is_empty() {
                deployment.save(&db).context("failed to save deployment")?;
            }
            outcome?;
            Ok(())
        }
    }
}

fn open_db(data_dir: &Path) -> Result<PoolDB> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    PoolDB::open(&db_path).with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// Creates an empty deployment. Refuses to overwrite an existing one.
fn init_deployment(data_dir: &Path, args: cli::InitArgs, clock: SharedClock) -> Result<()> {
    let db = open_db(data_dir)?;
    if Deployment::load(&db, clock.clone())?.is_some() {
        bail!("a deployment already exists in {}", data_dir.display());
    }
    let deployment = Deployment::new(Address::new(args.registry), Address::new(args.fee_owner), clock);
    deployment.save(&db).context("failed to save deployment")?;

    tracing::info!(data_dir = %data_dir.display(), "deployment initialized");
    println!("Deployment initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Registry       : {}", deployment.registry().address());
    println!("  Fee owner      : {}", deployment.fees().read().owner());
    Ok(())
}

/// Runs one command. Returns whether the deployment changed.
fn execute(deployment: &mut Deployment, command: Commands) -> Result<bool> {
    match command {
        Commands::CreateToken(args) => {
            deployment.bank().write().create_token(
                Address::new(args.token),
                args.symbol,
                Address::new(args.issuer),
            )?;
        }
        Commands::Mint(args) => {
            deployment.bank().write().mint(
                &Address::new(args.caller),
                &Address::new(args.token),
                &Address::new(args.to),
                args.amount,
            )?;
        }
        Commands::Approve(args) => {
            let spender = match (args.spender, args.pool) {
                (Some(spender), _) => Address::new(spender),
                (None, Some(pool_id)) => deployment.registry().ledger_address(pool_id)?.clone(),
                (None, None) => bail!("either --spender or --pool is required"),
            };
            deployment.bank().write().approve(
                &Address::new(args.token),
                &Address::new(args.owner),
                &spender,
                args.amount,
            )?;
            println!("approved {spender} for {}", args.amount);
        }
        Commands::SetProtocolFee(args) => {
            deployment
                .fees()
                .write()
                .set_protocol_fee(&Address::new(args.caller), args.bps)?;
        }
        Commands::CreatePool(args) => {
            let config = PoolConfig {
                metadata_uri: args.metadata_uri,
                payment_cycle_duration: args.payment_cycle,
                loan_default_duration: args.default_window,
                loan_expiration_duration: args.expiration,
                apr_bps: args.apr_bps,
                marketplace_fee_bps: args.marketplace_fee_bps,
                max_loan_duration: args.max_duration,
                require_lender_attestation: !args.open_lending,
                require_borrower_attestation: !args.open_borrowing,
            };
            deployment
                .registry_mut()
                .create_pool(&Address::new(args.owner), config)?;
        }
        Commands::AddLender(args) => {
            deployment.registry_mut().add_lender(
                &Address::new(args.caller),
                args.pool,
                &Address::new(args.identity),
                args.expiration,
            )?;
        }
        Commands::AddBorrower(args) => {
            deployment.registry_mut().add_borrower(
                &Address::new(args.caller),
                args.pool,
                &Address::new(args.identity),
                args.expiration,
            )?;
        }
        Commands::RemoveLender(args) => {
            let identity = Address::new(args.identity);
            let existed = deployment.registry_mut().remove_lender(
                &Address::new(args.caller),
                args.pool,
                &identity,
            )?;
            if !existed {
                println!("no lender attestation for {identity} in pool {}", args.pool);
            }
        }
        Commands::RemoveBorrower(args) => {
            let identity = Address::new(args.identity);
            let existed = deployment.registry_mut().remove_borrower(
                &Address::new(args.caller),
                args.pool,
                &identity,
            )?;
            if !existed {
                println!("no borrower attestation for {identity} in pool {}", args.pool);
            }
        }
        Commands::RequestLoan(args) => {
            let caller = Address::new(args.caller);
            let receiver = args.receiver.map(Address::new).unwrap_or_else(|| caller.clone());
            deployment.registry_mut().ledger_mut(args.pool)?.loan_request(
                &caller,
                &Address::new(args.token),
                args.pool,
                args.principal,
                args.duration,
                args.rate_bps,
                &receiver,
            )?;
        }
        Commands::AcceptLoan(args) => {
            deployment
                .registry_mut()
                .ledger_mut(args.pool)?
                .accept_loan(&Address::new(args.caller), args.loan)?;
        }
        Commands::Repay(args) => {
            run_repayment(deployment, args, false)?;
        }
        Commands::RepayFull(args) => {
            run_repayment(deployment, args, true)?;
        }
        Commands::ShowLoan(args) => {
            show_loan(deployment, args.pool, args.loan)?;
            return Ok(false);
        }
        Commands::ShowPool(args) => {
            show_pool(deployment, args.pool)?;
            return Ok(false);
        }
        Commands::Balance(args) => {
            let balance = deployment
                .bank()
                .read()
                .balance_of(&Address::new(args.token), &Address::new(args.account));
            println!("{balance}");
            return Ok(false);
        }
        Commands::Init(_) | Commands::Version => {
            bail!("command does not operate on a loaded deployment")
        }
    }
    Ok(true)
}

fn run_repayment(deployment: &mut Deployment, args: cli::LoanArgs, full: bool) -> Result<()> {
    let ledger = deployment.registry_mut().ledger_mut(args.pool)?;
    let caller = Address::new(args.caller);
    let amount = if full {
        ledger.repay_full_loan(&caller, args.loan)?
    } else {
        ledger.repay_your_loan(&caller, args.loan)?
    };
    tracing::debug!(amount, full, "repayment collected");
    Ok(())
}

fn format_time(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn show_loan(deployment: &Deployment, pool_id: u64, loan_id: u64) -> Result<()> {
    let ledger = deployment.registry().ledger(pool_id)?;
    let loan = ledger.loan(loan_id)?;
    let view = json!({
        "loan": loan,
        "effective_state": ledger.effective_state(loan_id)?,
        "installment_due": ledger.view_installment_amount(loan_id)?,
        "full_repay_amount": ledger.view_full_repay_amount(loan_id)?,
        "is_expired": ledger.is_loan_expired(loan_id)?,
        "is_payment_late": ledger.is_payment_late(loan_id)?,
        "is_defaulted": ledger.is_loan_defaulted(loan_id)?,
        "next_due": ledger.calculate_next_due_date(loan_id)?.map(format_time),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn show_pool(deployment: &Deployment, pool_id: u64) -> Result<()> {
    let registry = deployment.registry();
    let pool = registry.pool(pool_id)?;
    let ledger = registry.ledger(pool_id)?;
    let loans: Vec<_> = ledger
        .loans()
        .iter()
        .map(|loan| {
            json!({
                "loan_id": loan.loan_id,
                "state": loan.state,
                "principal": loan.principal,
                "outstanding": loan.outstanding_balance(),
            })
        })
        .collect();
    let view = json!({
        "pool": pool,
        "created": format_time(pool.created_at),
        "loans": loans,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("peerpool {}", env!("CARGO_PKG_VERSION"));
    println!("protocol {}", peerpool_protocol::config::PROTOCOL_VERSION);
}
