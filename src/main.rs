//! Subledger - subscription ledger with prorated period totals
//!
//! ## Usage
//!
//! ```bash
//! # Record a subscription
//! subledger create --service "Yandex Plus" --price 400 \
//!     --user 60601fee-2bf1-4721-ae6f-7636e79a0cba --start 07-2025
//!
//! # Total cost for one user over a year
//! subledger total --from 01-2025 --to 12-2025 \
//!     --user 60601fee-2bf1-4721-ae6f-7636e79a0cba
//!
//! # With verbose logging and an explicit database
//! subledger -v --db /tmp/subscriptions.db list --service Netflix
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use subledger_config::Config;
use subledger_core::{CalendarMonth, LedgerError, LogGuard, QueryPeriod, init_logging};
use subledger_cost::{
    CostError, FilterCriteria, ListQuery, NewSubscription, SubscriptionDatabase,
    SubscriptionService, SubscriptionUpdate,
};
use tracing::{error, info};
use uuid::Uuid;

/// Subscription ledger
///
/// Records recurring subscriptions and reports their cost prorated to whole
/// months over a query period.
#[derive(Parser, Debug)]
#[command(name = "subledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.subledger/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and SUBLEDGER_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory for log files (defaults to ~/.subledger/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new subscription
    Create(CreateArgs),
    /// Show one subscription
    Get {
        /// Subscription id
        id: Uuid,
    },
    /// Change fields of a subscription
    Update(UpdateArgs),
    /// Remove a subscription
    Delete {
        /// Subscription id
        id: Uuid,
    },
    /// List subscriptions, newest first
    List(ListArgs),
    /// Total prorated cost over a period
    Total(TotalArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Service name
    #[arg(long)]
    service: String,
    /// Monthly price in whole currency units
    #[arg(long)]
    price: u32,
    /// Owning user id
    #[arg(long)]
    user: Uuid,
    /// First billed month (MM-YYYY)
    #[arg(long)]
    start: CalendarMonth,
    /// Last billed month (MM-YYYY); omit for open-ended
    #[arg(long)]
    end: Option<CalendarMonth>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Subscription id
    id: Uuid,
    #[arg(long)]
    service: Option<String>,
    #[arg(long)]
    price: Option<u32>,
    #[arg(long)]
    start: Option<CalendarMonth>,
    #[arg(long)]
    end: Option<CalendarMonth>,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Only subscriptions owned by this user id
    #[arg(long)]
    user: Option<String>,
    /// Only subscriptions with exactly this service name
    #[arg(long)]
    service: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            owner_id: self.user.clone(),
            service_name: self.service.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,
    /// Page size (1-100, defaults to listing.default_limit)
    #[arg(long)]
    limit: Option<u32>,
    /// Records to skip
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[derive(Args, Debug)]
struct TotalArgs {
    /// First month of the period (MM-YYYY)
    #[arg(long)]
    from: String,
    /// Last month of the period (MM-YYYY)
    #[arg(long)]
    to: String,
    #[command(flatten)]
    filter: FilterArgs,
    /// Include per-subscription contributions
    #[arg(long)]
    breakdown: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(1);
        }
    };

    // Initialize logging
    let _guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("subledger error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Resolve configuration: file, then environment, then flags.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load().context("loading config")?,
    };
    config.apply_env();

    if let Some(db) = &cli.db {
        config.database.path = Some(db.clone());
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    if cli.verbose > 0 {
        config.logging.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

/// Set up logging from the resolved configuration.
fn setup_logging(config: &Config) -> subledger_core::Result<LogGuard> {
    init_logging(config.logging.dir.clone(), config.logging.verbose)
}

fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::DirectoryCreation {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let db = SubscriptionDatabase::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let stored = db.count()?;
    let service = SubscriptionService::new(&db);
    info!(db = %db_path.display(), subscriptions = stored, "database ready");

    match command {
        Command::Create(args) => {
            let sub = service.create(NewSubscription {
                service_name: args.service,
                price: args.price,
                owner_id: args.user,
                start_period: args.start,
                end_period: args.end,
            })?;
            print_json(&sub)
        }
        Command::Get { id } => print_json(&service.get(id)?),
        Command::Update(args) => {
            let update = SubscriptionUpdate {
                service_name: args.service,
                price: args.price,
                start_period: args.start,
                end_period: args.end,
            };
            print_json(&service.update(args.id, update)?)
        }
        Command::Delete { id } => {
            service.delete(id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": true }))
        }
        Command::List(args) => {
            let query = ListQuery::new(args.filter.criteria())
                .with_limit(args.limit.unwrap_or(config.listing.default_limit))
                .with_offset(args.offset);
            print_json(&service.list(&query)?)
        }
        Command::Total(args) => {
            let period = QueryPeriod::parse(&args.from, &args.to)?;
            let criteria = args.filter.criteria();
            if args.breakdown {
                print_json(&service.cost_breakdown(&criteria, &period)?)
            } else {
                print_json(&service.calculate_total(&criteria, &period)?)
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{rendered}");
    Ok(())
}

/// 2 for caller mistakes, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    let invalid = err.chain().any(|cause| {
        cause
            .downcast_ref::<CostError>()
            .is_some_and(CostError::is_invalid_argument)
            || cause
                .downcast_ref::<LedgerError>()
                .is_some_and(LedgerError::is_invalid_argument)
    });
    if invalid { 2 } else { 1 }
}
