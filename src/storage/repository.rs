use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::{Account, Customer, Transaction, format_amount};

use super::StoreError;
use super::codec::{
    ACCOUNT_LAYOUT, BlockLayout, CUSTOMER_LAYOUT, ParseError, RawBlock, TRANSACTION_LAYOUT,
    decode_account, decode_customer, decode_transaction, encode_account, encode_customer,
    encode_transaction, parse_blocks, replace_account_block,
};

pub const CUSTOMERS_FILE: &str = "customers_data.txt";
pub const ACCOUNTS_FILE: &str = "accounts_data.txt";
pub const TRANSACTIONS_FILE: &str = "transactions_data.txt";

/// What a load found, including the records it had to leave out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub customers: usize,
    pub accounts: usize,
    pub transactions: usize,
    /// Accounts whose owner is not in the customer store
    pub orphan_accounts: usize,
    /// Transactions whose account is not in the account store
    pub orphan_transactions: usize,
    /// Accounts whose stored balance lagged behind their history
    pub reconciled: usize,
}

/// Everything read back from the stores, linked and ready for the service.
#[derive(Debug, Clone)]
pub struct LoadedLedger {
    pub customers: Vec<Customer>,
    pub accounts: Vec<Account>,
    pub report: LoadReport,
}

/// A single store file with single-writer discipline.
#[derive(Debug)]
struct StoreFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StoreFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn parse_error(&self, error: ParseError) -> StoreError {
        StoreError::Parse {
            path: self.path.clone(),
            line: error.line,
            reason: error.reason,
        }
    }

    /// Read the whole file; a missing file is an empty store.
    async fn read(&self) -> Result<String, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn blocks(&self, layout: &BlockLayout) -> Result<Vec<RawBlock>, StoreError> {
        let text = self.read().await?;
        parse_blocks(&text, layout).map_err(|e| self.parse_error(e))
    }

    /// Append `text` and sync it to disk before returning.
    async fn append(&self, text: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        file.write_all(text.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))?;
        file.sync_all().await.map_err(|e| self.write_error(e))?;
        Ok(())
    }

    /// Replace the file content through a synced temp file and a rename, so a
    /// crash leaves either the old or the new content, never a mix.
    async fn replace_with(&self, contents: &str) -> Result<(), StoreError> {
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let result = self.write_and_rename(&tmp_path, contents).await;
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    async fn write_and_rename(&self, tmp_path: &Path, contents: &str) -> Result<(), StoreError> {
        let mut file = fs::File::create(tmp_path)
            .await
            .map_err(|e| self.write_error(e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))?;
        file.sync_all().await.map_err(|e| self.write_error(e))?;
        drop(file);

        fs::rename(tmp_path, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        self.sync_parent().await
    }

    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let handle = fs::File::open(dir).await.map_err(|e| self.write_error(e))?;
        handle.sync_all().await.map_err(|e| self.write_error(e))
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Flat-file repository for customers, accounts and transactions.
///
/// Customers and transactions are append-only. Account blocks carry the
/// current balance and are replaced through [`Repository::rewrite_account`].
#[derive(Debug)]
pub struct Repository {
    data_dir: PathBuf,
    customers: StoreFile,
    accounts: StoreFile,
    transactions: StoreFile,
}

impl Repository {
    /// Create a repository over the store files in `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            customers: StoreFile::new(data_dir.join(CUSTOMERS_FILE)),
            accounts: StoreFile::new(data_dir.join(ACCOUNTS_FILE)),
            transactions: StoreFile::new(data_dir.join(TRANSACTIONS_FILE)),
            data_dir,
        }
    }

    /// Create the data directory if needed and return a repository over it.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let repo = Self::new(data_dir);
        fs::create_dir_all(&repo.data_dir)
            .await
            .map_err(|source| StoreError::Write {
                path: repo.data_dir.clone(),
                source,
            })?;
        Ok(repo)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn accounts_path(&self) -> &Path {
        &self.accounts.path
    }

    // ========================
    // Writes
    // ========================

    pub async fn append_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        self.customers.append(&encode_customer(customer)).await
    }

    pub async fn append_account(&self, account: &Account) -> Result<(), StoreError> {
        self.accounts.append(&encode_account(account)).await
    }

    pub async fn append_transaction(
        &self,
        account_number: &str,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        self.transactions
            .append(&encode_transaction(account_number, transaction))
            .await
    }

    /// Replace the stored block of `account` with its current state. Every
    /// other account block is kept byte-for-byte.
    pub async fn rewrite_account(&self, account: &Account) -> Result<(), StoreError> {
        let _guard = self.accounts.lock.lock().await;
        let existing = self.accounts.read().await?;
        let updated = replace_account_block(
            &existing,
            account.account_number(),
            &encode_account(account),
        );
        self.accounts.replace_with(&updated).await?;
        debug!(
            "Rewrote account {} (balance {})",
            account.account_number(),
            format_amount(account.balance())
        );
        Ok(())
    }

    // ========================
    // Load
    // ========================

    /// Read all three stores and link them: customers first, then accounts
    /// to their owners, then transactions, in file order, to their accounts.
    pub async fn load_all(&self) -> Result<LoadedLedger, StoreError> {
        let mut report = LoadReport::default();

        let mut customers = Vec::new();
        let mut customer_ids = HashSet::new();
        for block in self.customers.blocks(&CUSTOMER_LAYOUT).await? {
            let customer = decode_customer(block).map_err(|e| self.customers.parse_error(e))?;
            if customer_ids.insert(customer.id.clone()) {
                customers.push(customer);
            } else {
                debug!("Ignoring repeated customer record {}", customer.id);
            }
        }
        report.customers = customers.len();

        let mut accounts: Vec<Account> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for block in self.accounts.blocks(&ACCOUNT_LAYOUT).await? {
            let record = decode_account(block).map_err(|e| self.accounts.parse_error(e))?;
            if !customer_ids.contains(&record.customer_id) {
                warn!(
                    "Skipping orphan account {}: customer {} not found",
                    record.number, record.customer_id
                );
                report.orphan_accounts += 1;
                continue;
            }
            let position = index.get(&record.number).copied();
            let account = Account::restore(
                record.number.clone(),
                record.kind,
                record.customer_id,
                record.balance,
            );
            match position {
                // A later block for the same number is the more recent one
                Some(i) => accounts[i] = account,
                None => {
                    index.insert(record.number, accounts.len());
                    accounts.push(account);
                }
            }
        }
        report.accounts = accounts.len();

        for block in self.transactions.blocks(&TRANSACTION_LAYOUT).await? {
            let record =
                decode_transaction(block).map_err(|e| self.transactions.parse_error(e))?;
            match index.get(&record.account_number) {
                Some(&i) => {
                    accounts[i].restore_transaction(record.transaction);
                    report.transactions += 1;
                }
                None => {
                    warn!(
                        "Skipping orphan transaction for unknown account {}",
                        record.account_number
                    );
                    report.orphan_transactions += 1;
                }
            }
        }

        for account in &mut accounts {
            if let Some(stale) = account.reconcile() {
                warn!(
                    "Account {} stored balance {} lags its history; using {}",
                    account.account_number(),
                    format_amount(stale),
                    format_amount(account.balance())
                );
                report.reconciled += 1;
            } else if account.transactions().is_empty() && account.balance() != 0.0 {
                warn!(
                    "Account {} has balance {} but no stored history",
                    account.account_number(),
                    format_amount(account.balance())
                );
            }
        }

        info!(
            "Loaded {} customers, {} accounts, {} transactions from {}",
            report.customers,
            report.accounts,
            report.transactions,
            self.data_dir.display()
        );

        Ok(LoadedLedger {
            customers,
            accounts,
            report,
        })
    }
}
