//! # CLI Interface
//!
//! Defines the command-line argument structure for `peerpool` using `clap`
//! derive. Every command runs against the deployment persisted in the data
//! directory; mutating commands save it back when they succeed.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Peer-to-peer pooled lending.
///
/// Drives a peerpool deployment stored on disk: pools, memberships, loans,
/// and the token balances they move.
#[derive(Parser, Debug)]
#[command(
    name = "peerpool",
    about = "Peer-to-peer pooled lending",
    version,
    propagate_version = true
)]
pub struct PeerpoolCli {
    /// Directory holding the deployment database.
    #[arg(
        long,
        short = 'd',
        env = "PEERPOOL_DATA_DIR",
        default_value = "./peerpool-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Pin the clock to this Unix timestamp instead of reading system time.
    #[arg(long, global = true)]
    pub now: Option<u64>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "PEERPOOL_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new, empty deployment in the data directory.
    Init(InitArgs),
    /// Register a token with its minting issuer.
    CreateToken(CreateTokenArgs),
    /// Mint tokens (issuer only).
    Mint(MintArgs),
    /// Let a spender, usually a loan ledger, pull tokens from an owner.
    Approve(ApproveArgs),
    /// Set the protocol fee rate (fee owner only).
    SetProtocolFee(SetProtocolFeeArgs),
    /// Create a lending pool.
    CreatePool(CreatePoolArgs),
    /// Attest a lender in a pool (pool owner only).
    AddLender(AddMemberArgs),
    /// Attest a borrower in a pool (pool owner only).
    AddBorrower(AddMemberArgs),
    /// Revoke a lender attestation (pool owner only).
    RemoveLender(RemoveMemberArgs),
    /// Revoke a borrower attestation (pool owner only).
    RemoveBorrower(RemoveMemberArgs),
    /// Open a loan request.
    RequestLoan(RequestLoanArgs),
    /// Fund a pending loan.
    AcceptLoan(LoanArgs),
    /// Pay the installment currently due.
    Repay(LoanArgs),
    /// Pay off everything still owed.
    RepayFull(LoanArgs),
    /// Print a loan with its derived state and amounts due.
    ShowLoan(ShowLoanArgs),
    /// Print a pool and its loans.
    ShowPool(ShowPoolArgs),
    /// Print an account's token balance.
    Balance(BalanceArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for `init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Address of the pool registry. It is also the attestation authority.
    #[arg(long, default_value = "peerpool-registry")]
    pub registry: String,

    /// Identity that administers protocol fees and initially receives them.
    #[arg(long)]
    pub fee_owner: String,
}

/// Arguments for `create-token`.
#[derive(Args, Debug)]
pub struct CreateTokenArgs {
    /// Token address.
    #[arg(long)]
    pub token: String,

    /// Ticker symbol.
    #[arg(long)]
    pub symbol: String,

    /// Identity allowed to mint.
    #[arg(long)]
    pub issuer: String,
}

/// Arguments for `mint`.
#[derive(Args, Debug)]
pub struct MintArgs {
    /// Identity performing the mint.
    #[arg(long)]
    pub caller: String,

    /// Token to mint.
    #[arg(long)]
    pub token: String,

    /// Account credited.
    #[arg(long)]
    pub to: String,

    /// Amount in base units.
    #[arg(long)]
    pub amount: u64,
}

/// Arguments for `approve`.
#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Account granting the allowance.
    #[arg(long)]
    pub owner: String,

    /// Token the allowance applies to.
    #[arg(long)]
    pub token: String,

    /// Account allowed to pull funds.
    #[arg(long, required_unless_present = "pool", conflicts_with = "pool")]
    pub spender: Option<String>,

    /// Approve the ledger of this pool instead of naming a spender.
    #[arg(long)]
    pub pool: Option<u64>,

    /// New allowance in base units.
    #[arg(long)]
    pub amount: u64,
}

/// Arguments for `set-protocol-fee`.
#[derive(Args, Debug)]
pub struct SetProtocolFeeArgs {
    /// Identity making the change; must be the fee owner.
    #[arg(long)]
    pub caller: String,

    /// New rate in basis points.
    #[arg(long)]
    pub bps: u32,
}

/// Arguments for `create-pool`.
#[derive(Args, Debug)]
pub struct CreatePoolArgs {
    /// Pool owner.
    #[arg(long)]
    pub owner: String,

    /// Pointer to pool documentation.
    #[arg(long)]
    pub metadata_uri: String,

    /// Seconds between installments.
    #[arg(long, default_value_t = 30 * 86_400)]
    pub payment_cycle: u64,

    /// Seconds past a missed due date before a loan defaults.
    #[arg(long, default_value_t = 180 * 86_400)]
    pub default_window: u64,

    /// Seconds a request waits for a lender.
    #[arg(long, default_value_t = 86_400)]
    pub expiration: u64,

    /// Advertised annual rate in basis points.
    #[arg(long, default_value_t = 0)]
    pub apr_bps: u32,

    /// Pool owner's share of each principal in basis points.
    #[arg(long, default_value_t = 0)]
    pub marketplace_fee_bps: u32,

    /// Longest loan term a borrower may request, in seconds.
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Let anyone lend without an attestation.
    #[arg(long)]
    pub open_lending: bool,

    /// Let anyone borrow without an attestation.
    #[arg(long)]
    pub open_borrowing: bool,
}

/// Arguments for `add-lender` and `add-borrower`.
#[derive(Args, Debug)]
pub struct AddMemberArgs {
    /// Identity making the change; must own the pool.
    #[arg(long)]
    pub caller: String,

    /// Pool id.
    #[arg(long)]
    pub pool: u64,

    /// Identity being attested.
    #[arg(long)]
    pub identity: String,

    /// Unix timestamp at which the attestation lapses.
    #[arg(long)]
    pub expiration: u64,
}

/// Arguments for `remove-lender` and `remove-borrower`.
#[derive(Args, Debug)]
pub struct RemoveMemberArgs {
    /// Identity making the change; must own the pool.
    #[arg(long)]
    pub caller: String,

    /// Pool id.
    #[arg(long)]
    pub pool: u64,

    /// Identity being revoked.
    #[arg(long)]
    pub identity: String,
}

/// Arguments for `request-loan`.
#[derive(Args, Debug)]
pub struct RequestLoanArgs {
    /// Borrower making the request.
    #[arg(long)]
    pub caller: String,

    /// Pool id.
    #[arg(long)]
    pub pool: u64,

    /// Token to borrow.
    #[arg(long)]
    pub token: String,

    /// Principal in base units.
    #[arg(long)]
    pub principal: u64,

    /// Loan term in seconds.
    #[arg(long)]
    pub duration: u64,

    /// Annual interest rate in basis points.
    #[arg(long, default_value_t = 0)]
    pub rate_bps: u32,

    /// Account receiving the payout. Defaults to the caller.
    #[arg(long)]
    pub receiver: Option<String>,
}

/// Arguments for commands acting on one loan.
#[derive(Args, Debug)]
pub struct LoanArgs {
    /// Identity making the call.
    #[arg(long)]
    pub caller: String,

    /// Pool id.
    #[arg(long)]
    pub pool: u64,

    /// Loan id within the pool.
    #[arg(long)]
    pub loan: u64,
}

/// Arguments for `show-loan`.
#[derive(Args, Debug)]
pub struct ShowLoanArgs {
    /// Pool id.
    #[arg(long)]
    pub pool: u64,

    /// Loan id within the pool.
    #[arg(long)]
    pub loan: u64,
}

/// Arguments for `show-pool`.
#[derive(Args, Debug)]
pub struct ShowPoolArgs {
    /// Pool id.
    #[arg(long)]
    pub pool: u64,
}

/// Arguments for `balance`.
#[derive(Args, Debug)]
pub struct BalanceArgs {
    /// Token to query.
    #[arg(long)]
    pub token: String,

    /// Account to query.
    #[arg(long)]
    pub account: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        PeerpoolCli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = PeerpoolCli::try_parse_from([
            "peerpool",
            "repay",
            "--caller",
            "bob",
            "--pool",
            "1",
            "--loan",
            "0",
            "--now",
            "1700000000",
        ])
        .unwrap();
        assert_eq!(cli.now, Some(1_700_000_000));
        match cli.command {
            Commands::Repay(args) => {
                assert_eq!(args.caller, "bob");
                assert_eq!((args.pool, args.loan), (1, 0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn approve_needs_spender_or_pool() {
        let base = ["peerpool", "approve", "--owner", "a", "--token", "USD", "--amount", "5"];
        assert!(PeerpoolCli::try_parse_from(base).is_err());

        let mut with_pool = base.to_vec();
        with_pool.extend(["--pool", "1"]);
        let cli = PeerpoolCli::try_parse_from(with_pool).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Approve(ApproveArgs { pool: Some(1), spender: None, .. })
        ));
    }
}
