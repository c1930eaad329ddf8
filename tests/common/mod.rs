// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use tally::application::LedgerService;
use tally::{Customer, LedgerConfig};
use tempfile::TempDir;

/// Helper to create a test service over a temporary data directory.
/// The background scheduler is off; tests drive interest explicitly.
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = open_service(temp_dir.path()).await?;
    Ok((service, temp_dir))
}

/// Open a fresh service instance over an existing data directory
pub async fn open_service(data_dir: &Path) -> Result<LedgerService> {
    let config = LedgerConfig::new(data_dir).without_scheduler();
    Ok(LedgerService::open(config).await?)
}

pub fn alice() -> Customer {
    Customer::new("C1", "Alice", "1 Main St", "555-0100")
}

pub fn bob() -> Customer {
    Customer::new("C2", "Bob", "2 High St", "555-0199")
}

/// Read a store file from the data directory
pub fn read_store(data_dir: &Path, file: &str) -> String {
    std::fs::read_to_string(data_dir.join(file)).unwrap_or_default()
}

/// Extract the raw account block for `number` from the account store text
pub fn account_block<'a>(text: &'a str, number: &str) -> Option<&'a str> {
    let start = text.find(&format!("=== ACCOUNT ===\nNumber: {}\n", number))?;
    let end_marker = "=== END ACCOUNT ===\n";
    let end = start + text[start..].find(end_marker)? + end_marker.len();
    Some(&text[start..end])
}
