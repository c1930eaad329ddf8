use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::Amount;

/// Timestamp layout used by the stores and statements.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    /// Credited by interest accrual; moves money like a deposit
    Interest,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::Interest => "Interest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Deposit" => Some(TransactionType::Deposit),
            "Withdrawal" => Some(TransactionType::Withdrawal),
            "Interest" => Some(TransactionType::Interest),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in an account's history. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionType,
    /// Signed: negative for withdrawals
    pub amount: Amount,
    /// Account balance right after this entry was applied
    pub balance_after: Amount,
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    /// Create a transaction stamped with the current local time.
    pub fn new(kind: TransactionType, amount: Amount, balance_after: Amount) -> Self {
        Self::at(kind, amount, balance_after, current_timestamp())
    }

    /// Create a transaction with an explicit timestamp (used when loading).
    pub fn at(
        kind: TransactionType,
        amount: Amount,
        balance_after: Amount,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            kind,
            amount,
            balance_after,
            timestamp,
        }
    }
}

/// Current local time truncated to whole seconds, the resolution of the stores.
pub fn current_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
