use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{AccountError, Amount};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Insufficient funds in account {account_number}: balance {balance:.2}, requested {requested:.2}"
    )]
    InsufficientFunds {
        account_number: String,
        balance: Amount,
        requested: Amount,
    },

    #[error("Invalid customer {field}: {reason}")]
    InvalidCustomer { field: &'static str, reason: String },

    #[error("Customer {0} is already registered with different details")]
    CustomerConflict(String),

    #[error("Failed to write statement {path}: {source}")]
    StatementWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    /// Attach the account number to a domain-level rejection.
    pub fn from_account(account_number: &str, error: AccountError) -> Self {
        match error {
            AccountError::InvalidAmount(amount) => {
                AppError::InvalidAmount(format!("amount must be positive, got {}", amount))
            }
            AccountError::BalanceOverflow { .. } => AppError::InvalidAmount(error.to_string()),
            AccountError::InsufficientFunds { balance, requested } => {
                AppError::InsufficientFunds {
                    account_number: account_number.to_string(),
                    balance,
                    requested,
                }
            }
        }
    }
}
