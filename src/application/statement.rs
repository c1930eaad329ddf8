use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::domain::{Account, Customer, TIMESTAMP_FORMAT, format_amount};

use super::AppError;

/// Base file name of a statement: `statement_<number>_<yyyyMMddHHmmss>.txt`.
pub fn statement_file_name(account_number: &str, generated_at: NaiveDateTime) -> String {
    let number: String = account_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "statement_{}_{}.txt",
        number,
        generated_at.format("%Y%m%d%H%M%S")
    )
}

/// Human-readable statement: summary, then every transaction in order.
pub fn render_statement(
    account: &Account,
    customer: &Customer,
    generated_at: NaiveDateTime,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Account Statement ===");
    let _ = writeln!(out, "Generated: {}", generated_at.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out, "Account Number: {}", account.account_number());
    let _ = writeln!(out, "Account Type: {}", account.kind());
    let _ = writeln!(out, "Customer Name: {}", customer.name);
    let _ = writeln!(out, "Customer ID: {}", customer.id);
    let _ = writeln!(out, "Current Balance: ${}", format_amount(account.balance()));
    let _ = writeln!(out);
    let _ = writeln!(out, "Transaction History:");
    let _ = writeln!(out, "{}", "-".repeat(40));

    for tx in account.transactions() {
        let _ = writeln!(
            out,
            "{} | {} | ${} | Balance: ${}",
            tx.timestamp.format(TIMESTAMP_FORMAT),
            tx.kind,
            format_amount(tx.amount.abs()),
            format_amount(tx.balance_after)
        );
    }
    out
}

/// Write the statement into `dir` under a name no other file uses yet.
pub async fn write_statement(
    dir: &Path,
    account: &Account,
    customer: &Customer,
    generated_at: NaiveDateTime,
) -> Result<PathBuf, AppError> {
    let contents = render_statement(account, customer, generated_at);
    let base = statement_file_name(account.account_number(), generated_at);
    let stem = base.trim_end_matches(".txt");

    let mut attempt = 0u32;
    loop {
        let path = if attempt == 0 {
            dir.join(&base)
        } else {
            dir.join(format!("{}_{}.txt", stem, attempt))
        };

        let open = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        let mut file = match open {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                attempt += 1;
                continue;
            }
            Err(source) => return Err(AppError::StatementWrite { path, source }),
        };

        let written = async {
            file.write_all(contents.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        return match written {
            Ok(()) => Ok(path),
            Err(source) => Err(AppError::StatementWrite { path, source }),
        };
    }
}
