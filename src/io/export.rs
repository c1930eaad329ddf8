use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, Customer, TIMESTAMP_FORMAT, format_decimal};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub customers: Vec<Customer>,
    pub accounts: Vec<Account>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export one account's transaction history to CSV format
    pub async fn export_transactions_csv<W: Write>(
        &self,
        account_number: &str,
        writer: W,
    ) -> Result<usize> {
        let account = self.service.find_account(account_number).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "account_number",
            "timestamp",
            "type",
            "amount",
            "balance_after",
        ])?;

        let mut count = 0;
        for tx in account.transactions() {
            csv_writer.write_record([
                account.account_number(),
                &tx.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                tx.kind.as_str(),
                &format_decimal(tx.amount),
                &format_decimal(tx.balance_after),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export account balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account_number", "type", "customer_id", "balance"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.account_number(),
                account.kind().as_str(),
                account.customer_id(),
                &format_decimal(account.balance()),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export the full ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            customers: self.service.list_customers().await,
            accounts: self.service.list_accounts().await,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
