use serde::{Deserialize, Serialize};

use super::{Amount, CustomerId, Transaction, TransactionType, format_amount};

pub type AccountNumber = String;

/// Account product. The only difference between kinds is the interest rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    Savings,
    Current,
}

impl AccountKind {
    /// Name used in the account store and on statements
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Savings => "SavingsAccount",
            AccountKind::Current => "CurrentAccount",
        }
    }

    /// Accepts the stored names as well as the short "savings"/"current" forms.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "savingsaccount" | "savings" => Some(AccountKind::Savings),
            "currentaccount" | "current" => Some(AccountKind::Current),
            _ => None,
        }
    }

    pub fn annual_rate(&self) -> f64 {
        match self {
            AccountKind::Savings => 0.045,
            AccountKind::Current => 0.01,
        }
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate() / 12.0
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer account: current balance plus the full, append-only history.
///
/// The balance always equals the `balance_after` of the last transaction
/// (or zero when there is none). Mutations go through [`Account::deposit`],
/// [`Account::withdraw`] and [`Account::calculate_interest`] only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    account_number: AccountNumber,
    kind: AccountKind,
    customer_id: CustomerId,
    balance: Amount,
    transactions: Vec<Transaction>,
}

impl Account {
    pub fn new(account_number: AccountNumber, kind: AccountKind, customer_id: CustomerId) -> Self {
        Self {
            account_number,
            kind,
            customer_id,
            balance: 0.0,
            transactions: Vec::new(),
        }
    }

    /// Rebuild an account from its stored record. History is attached
    /// afterwards with [`Account::restore_transaction`].
    pub(crate) fn restore(
        account_number: AccountNumber,
        kind: AccountKind,
        customer_id: CustomerId,
        balance: Amount,
    ) -> Self {
        Self {
            account_number,
            kind,
            customer_id,
            balance,
            transactions: Vec::new(),
        }
    }

    pub(crate) fn restore_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Align the balance with the last stored transaction. Returns the stale
    /// balance when they disagreed.
    pub(crate) fn reconcile(&mut self) -> Option<Amount> {
        let last = self.transactions.last()?.balance_after;
        if last == self.balance {
            return None;
        }
        let stale = self.balance;
        self.balance = last;
        Some(stale)
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<&Transaction, AccountError> {
        self.credit(TransactionType::Deposit, amount)
    }

    pub fn withdraw(&mut self, amount: Amount) -> Result<&Transaction, AccountError> {
        validate_amount(amount)?;
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(self.push(TransactionType::Withdrawal, -amount))
    }

    /// Credit one month of interest at the kind's rate.
    /// Returns `None` when there is nothing to credit (zero balance).
    pub fn calculate_interest(&mut self) -> Option<&Transaction> {
        let interest = self.balance * self.kind.monthly_rate();
        self.credit(TransactionType::Interest, interest).ok()
    }

    fn credit(&mut self, kind: TransactionType, amount: Amount) -> Result<&Transaction, AccountError> {
        validate_amount(amount)?;
        let new_balance = self.balance + amount;
        if !new_balance.is_finite() {
            return Err(AccountError::BalanceOverflow {
                balance: self.balance,
                amount,
            });
        }
        self.balance = new_balance;
        Ok(self.push(kind, amount))
    }

    fn push(&mut self, kind: TransactionType, amount: Amount) -> &Transaction {
        self.transactions
            .push(Transaction::new(kind, amount, self.balance));
        &self.transactions[self.transactions.len() - 1]
    }
}

fn validate_amount(amount: Amount) -> Result<(), AccountError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AccountError::InvalidAmount(amount))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountError {
    InvalidAmount(Amount),
    InsufficientFunds { balance: Amount, requested: Amount },
    /// The resulting balance would not be a finite number
    BalanceOverflow { balance: Amount, amount: Amount },
}

impl std::fmt::Display for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::InvalidAmount(amount) => {
                write!(f, "amount must be positive, got {}", amount)
            }
            AccountError::InsufficientFunds { balance, requested } => write!(
                f,
                "insufficient funds: balance {}, requested {}",
                format_amount(*balance),
                format_amount(*requested)
            ),
            AccountError::BalanceOverflow { balance, amount } => write!(
                f,
                "adding {:e} to balance {:e} exceeds the representable range",
                amount, balance
            ),
        }
    }
}

impl std::error::Error for AccountError {}
