use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::application::LedgerService;
use crate::config::{DEFAULT_INTEREST_INTERVAL, LedgerConfig, MAX_INTEREST_INTERVAL};
use crate::domain::{
    AccountKind, Customer, TIMESTAMP_FORMAT, format_amount, parse_amount,
};

/// Tally - durable account ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "A flat-file account ledger with deposits, withdrawals and monthly interest")]
#[command(version)]
pub struct Cli {
    /// Directory holding the ledger data files
    #[arg(short, long, env = "TALLY_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory statements are written to (defaults to the data directory)
    #[arg(long, env = "TALLY_STATEMENT_DIR")]
    pub statement_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a new account for a customer
    Open {
        /// Account type: savings, current
        #[arg(short = 't', long = "type")]
        account_type: String,

        /// Customer ID (reused if already registered)
        #[arg(long)]
        customer_id: String,

        /// Customer name
        #[arg(long)]
        name: String,

        /// Customer address
        #[arg(long, default_value = "")]
        address: String,

        /// Customer phone
        #[arg(long, default_value = "")]
        phone: String,
    },

    /// Deposit money into an account
    Deposit {
        /// Account number
        account: String,

        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account number
        account: String,

        /// Amount to withdraw (e.g., "50.00" or "50")
        amount: String,
    },

    /// Show an account with its full history
    Show {
        /// Account number
        account: String,
    },

    /// List accounts
    Accounts {
        /// Only accounts owned by this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Write a statement file for an account
    Statement {
        /// Account number
        account: String,
    },

    /// Credit one period of interest to every account now
    Interest,

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, balances, full
        export_type: String,

        /// Account number (required for transactions)
        #[arg(short, long)]
        account: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run the interest scheduler until interrupted (Ctrl-C)
    Serve {
        /// Seconds between interest runs (at most ten years)
        #[arg(
            long,
            default_value_t = DEFAULT_INTEREST_INTERVAL.as_secs(),
            value_parser = clap::value_parser!(u64).range(1..=MAX_INTEREST_INTERVAL.as_secs())
        )]
        interval_secs: u64,
    },
}

impl Cli {
    /// Ledger settings from the global flags. One-shot commands run without
    /// the background scheduler.
    pub fn config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::new(&self.data_dir).without_scheduler();
        if let Some(dir) = &self.statement_dir {
            config = config.with_statement_dir(dir);
        }
        config
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        if let Commands::Serve { interval_secs } = self.command {
            return run_serve_command(config, Duration::from_secs(interval_secs)).await;
        }

        let service = LedgerService::open(config)
            .await
            .with_context(|| format!("Failed to open ledger in {}", self.data_dir.display()))?;
        report_load(&service, self.verbose);

        match self.command {
            Commands::Open {
                account_type,
                customer_id,
                name,
                address,
                phone,
            } => {
                let kind = AccountKind::from_str(&account_type).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Invalid account type '{}'. Valid types: savings, current",
                        account_type
                    )
                })?;
                let customer = Customer::new(customer_id, name, address, phone);
                let account = service.create_account(kind, customer).await?;
                println!(
                    "Opened {} {} for customer {}",
                    account.kind(),
                    account.account_number(),
                    account.customer_id()
                );
            }

            Commands::Deposit { account, amount } => {
                let amount = parse_amount(&amount)
                    .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {}", amount, e))?;
                let tx = service.deposit(&account, amount).await?;
                println!(
                    "Deposited {} into {} (balance {})",
                    format_amount(tx.amount),
                    account,
                    format_amount(tx.balance_after)
                );
            }

            Commands::Withdraw { account, amount } => {
                let amount = parse_amount(&amount)
                    .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {}", amount, e))?;
                let tx = service.withdraw(&account, amount).await?;
                println!(
                    "Withdrew {} from {} (balance {})",
                    format_amount(tx.amount.abs()),
                    account,
                    format_amount(tx.balance_after)
                );
            }

            Commands::Show { account } => {
                run_show_command(&service, &account).await?;
            }

            Commands::Accounts { customer } => {
                run_accounts_command(&service, customer.as_deref()).await?;
            }

            Commands::Statement { account } => {
                let path = service.generate_statement(&account).await?;
                println!("Statement written to {}", path.display());
            }

            Commands::Interest => {
                let run = service.accrue_interest().await?;
                if run.credited.is_empty() {
                    println!("No interest credited.");
                }
                for credit in run.credited {
                    println!(
                        "{:<28} +{:>12} -> {:>12}",
                        credit.account_number,
                        format_amount(credit.transaction.amount),
                        format_amount(credit.transaction.balance_after)
                    );
                }
            }

            Commands::Export {
                export_type,
                account,
                output,
            } => {
                run_export_command(
                    &service,
                    &export_type,
                    account.as_deref(),
                    output.as_deref(),
                )
                .await?;
            }

            // Runs before the ledger is opened, see above
            Commands::Serve { .. } => {}
        }

        service.shutdown().await;
        Ok(())
    }
}

fn report_load(service: &LedgerService, verbose: bool) {
    let report = service.load_report();
    if report.orphan_accounts + report.orphan_transactions + report.reconciled > 0 {
        eprintln!(
            "Warning: skipped {} orphan account(s) and {} orphan transaction(s); reconciled {} balance(s)",
            report.orphan_accounts, report.orphan_transactions, report.reconciled
        );
    } else if verbose {
        eprintln!(
            "Loaded {} customer(s), {} account(s), {} transaction(s)",
            report.customers, report.accounts, report.transactions
        );
    }
}

async fn run_serve_command(config: LedgerConfig, interval: Duration) -> Result<()> {
    let data_dir = config.data_dir.clone();
    let service = LedgerService::open(config.with_interest_interval(interval))
        .await
        .with_context(|| format!("Failed to open ledger in {}", data_dir.display()))?;

    println!(
        "Serving ledger in {} (interest every {}s). Press Ctrl-C to stop.",
        data_dir.display(),
        interval.as_secs()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutdown requested");
    service.shutdown().await;
    println!("Stopped.");
    Ok(())
}

async fn run_show_command(service: &LedgerService, account_number: &str) -> Result<()> {
    let info = service.get_account_info(account_number).await?;
    let account = &info.account;

    println!("Account: {}", account.account_number());
    println!("  Type:     {}", account.kind());
    println!("  Owner:    {} ({})", info.owner.name, info.owner.id);
    if !info.owner.address.is_empty() {
        println!("  Address:  {}", info.owner.address);
    }
    if !info.owner.phone.is_empty() {
        println!("  Phone:    {}", info.owner.phone);
    }
    println!("  Balance:  {}", format_amount(account.balance()));
    println!();

    if account.transactions().is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:>12} {:>12}",
        "TIMESTAMP", "TYPE", "AMOUNT", "BALANCE"
    );
    println!("{}", "-".repeat(57));
    for tx in account.transactions() {
        println!(
            "{:<20} {:<10} {:>12} {:>12}",
            tx.timestamp.format(TIMESTAMP_FORMAT),
            tx.kind,
            format_amount(tx.amount),
            format_amount(tx.balance_after)
        );
    }
    Ok(())
}

async fn run_accounts_command(service: &LedgerService, customer: Option<&str>) -> Result<()> {
    let accounts = match customer {
        Some(id) => service.accounts_for_customer(id).await?,
        None => service.list_accounts().await,
    };

    if accounts.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!(
        "{:<28} {:<16} {:<12} {:>12}",
        "NUMBER", "TYPE", "CUSTOMER", "BALANCE"
    );
    println!("{}", "-".repeat(71));
    for account in accounts {
        println!(
            "{:<28} {:<16} {:<12} {:>12}",
            account.account_number(),
            account.kind(),
            account.customer_id(),
            format_amount(account.balance())
        );
    }
    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    account: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let account = account
                .ok_or_else(|| anyhow::anyhow!("--account is required for transactions export"))?;
            let count = exporter.export_transactions_csv(account, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} customers, {} accounts",
                    snapshot.customers.len(),
                    snapshot.accounts.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, balances, full",
                export_type
            );
        }
    }

    Ok(())
}
