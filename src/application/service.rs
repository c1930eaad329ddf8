use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountError, AccountKind, AccountNumber, Amount, Customer, Transaction,
    current_timestamp, format_amount,
};
use crate::storage::{LoadReport, Repository};

use super::statement::write_statement;
use super::{AppError, InterestScheduler};

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, API, GUI, etc.).
pub struct LedgerService {
    core: Arc<LedgerCore>,
    scheduler: Mutex<Option<InterestScheduler>>,
}

/// An account together with its owner
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub account: Account,
    pub owner: Customer,
}

/// One interest credit made by an accrual run
#[derive(Debug, Clone, Serialize)]
pub struct InterestCredit {
    pub account_number: AccountNumber,
    pub transaction: Transaction,
}

/// Result of an interest accrual run
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterestRun {
    pub credited: Vec<InterestCredit>,
}

/// In-memory ledger. Guarded by a single lock held across every
/// read-modify-persist sequence.
#[derive(Debug)]
struct LedgerState {
    customers: Vec<Customer>,
    accounts: Vec<Account>,
}

impl LedgerState {
    fn account_mut(&mut self, account_number: &str) -> Result<&mut Account, AppError> {
        self.accounts
            .iter_mut()
            .find(|a| a.account_number() == account_number)
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    fn account(&self, account_number: &str) -> Result<&Account, AppError> {
        self.accounts
            .iter()
            .find(|a| a.account_number() == account_number)
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    fn customer(&self, id: &str) -> Result<&Customer, AppError> {
        self.customers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    /// `ACC<millis>-<8 hex>`, redrawn until no account uses it.
    fn unused_account_number(&self) -> AccountNumber {
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let number = format!("ACC{}-{}", Utc::now().timestamp_millis(), &suffix[..8]);
            if self.account(&number).is_err() {
                return number;
            }
        }
    }
}

struct LedgerCore {
    repo: Repository,
    state: Mutex<LedgerState>,
    statement_dir: PathBuf,
    load_report: LoadReport,
}

impl LedgerCore {
    /// Record a mutation that already happened in memory: append the new
    /// transaction, then rewrite the account's balance block.
    async fn persist(&self, account: &Account, transaction: &Transaction) -> Result<(), AppError> {
        let written = async {
            self.repo
                .append_transaction(account.account_number(), transaction)
                .await?;
            self.repo.rewrite_account(account).await
        }
        .await;

        if let Err(e) = &written {
            error!(
                "Account {} changed in memory but was not persisted: {}",
                account.account_number(),
                e
            );
        }
        Ok(written?)
    }

    async fn apply<F>(&self, account_number: &str, op: F) -> Result<Transaction, AppError>
    where
        F: FnOnce(&mut Account) -> Result<Transaction, AccountError>,
    {
        let mut state = self.state.lock().await;
        let account = state.account_mut(account_number)?;
        let transaction =
            op(&mut *account).map_err(|e| AppError::from_account(account_number, e))?;
        self.persist(account, &transaction).await?;

        debug!(
            "{} {} on {} -> balance {}",
            transaction.kind,
            format_amount(transaction.amount),
            account_number,
            format_amount(transaction.balance_after)
        );
        Ok(transaction)
    }

    async fn accrue_interest(&self) -> Result<InterestRun, AppError> {
        let mut state = self.state.lock().await;
        let mut run = InterestRun::default();

        for account in state.accounts.iter_mut() {
            let Some(transaction) = account.calculate_interest().cloned() else {
                continue;
            };
            self.persist(account, &transaction).await?;
            run.credited.push(InterestCredit {
                account_number: account.account_number().to_string(),
                transaction,
            });
        }

        Ok(run)
    }
}

impl LedgerService {
    /// Load the ledger from `config.data_dir` and, if configured, start the
    /// background interest scheduler.
    pub async fn open(config: LedgerConfig) -> Result<Self, AppError> {
        let repo = Repository::open(&config.data_dir).await?;
        let loaded = repo.load_all().await?;

        let core = Arc::new(LedgerCore {
            repo,
            state: Mutex::new(LedgerState {
                customers: loaded.customers,
                accounts: loaded.accounts,
            }),
            statement_dir: config.statement_dir,
            load_report: loaded.report,
        });

        let scheduler = config.interest_interval.map(|interval| {
            let core = core.clone();
            InterestScheduler::start(interval, move || {
                let core = core.clone();
                async move { core.accrue_interest().await }
            })
        });

        Ok(Self {
            core,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Stop the interest scheduler, letting a run in progress complete.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await;
        }
    }

    /// What was found when the stores were loaded.
    pub fn load_report(&self) -> &LoadReport {
        &self.core.load_report
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account for `customer`, registering the customer on first use.
    pub async fn create_account(
        &self,
        kind: AccountKind,
        customer: Customer,
    ) -> Result<Account, AppError> {
        if let Some(field) = customer.invalid_field() {
            return Err(AppError::InvalidCustomer {
                field,
                reason: "must be non-empty and fit on one line".to_string(),
            });
        }

        let mut state = self.core.state.lock().await;

        match state.customers.iter().position(|c| c.id == customer.id) {
            Some(i) if state.customers[i] != customer => {
                return Err(AppError::CustomerConflict(customer.id));
            }
            Some(_) => debug!("Customer {} already registered", customer.id),
            None => {
                self.core.repo.append_customer(&customer).await?;
                state.customers.push(customer.clone());
            }
        }

        let account = Account::new(state.unused_account_number(), kind, customer.id);
        self.core.repo.append_account(&account).await?;
        state.accounts.push(account.clone());

        info!(
            "Opened {} {} for customer {}",
            account.kind(),
            account.account_number(),
            account.customer_id()
        );
        Ok(account)
    }

    /// Deposit `amount` and return the recorded transaction.
    pub async fn deposit(
        &self,
        account_number: &str,
        amount: Amount,
    ) -> Result<Transaction, AppError> {
        self.core
            .apply(account_number, |account| account.deposit(amount).cloned())
            .await
    }

    /// Withdraw `amount` and return the recorded transaction.
    pub async fn withdraw(
        &self,
        account_number: &str,
        amount: Amount,
    ) -> Result<Transaction, AppError> {
        self.core
            .apply(account_number, |account| account.withdraw(amount).cloned())
            .await
    }

    /// Get a snapshot of an account.
    pub async fn find_account(&self, account_number: &str) -> Result<Account, AppError> {
        let state = self.core.state.lock().await;
        state.account(account_number).cloned()
    }

    /// Get an account snapshot together with its owner.
    pub async fn get_account_info(&self, account_number: &str) -> Result<AccountInfo, AppError> {
        let state = self.core.state.lock().await;
        let account = state.account(account_number)?.clone();
        let owner = state.customer(account.customer_id())?.clone();
        Ok(AccountInfo { account, owner })
    }

    /// List all accounts in creation order.
    pub async fn list_accounts(&self) -> Vec<Account> {
        self.core.state.lock().await.accounts.clone()
    }

    /// Get a registered customer.
    pub async fn get_customer(&self, id: &str) -> Result<Customer, AppError> {
        let state = self.core.state.lock().await;
        state.customer(id).cloned()
    }

    /// List all registered customers.
    pub async fn list_customers(&self) -> Vec<Customer> {
        self.core.state.lock().await.customers.clone()
    }

    /// List the accounts owned by a customer.
    pub async fn accounts_for_customer(&self, id: &str) -> Result<Vec<Account>, AppError> {
        let state = self.core.state.lock().await;
        state.customer(id)?;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.customer_id() == id)
            .cloned()
            .collect())
    }

    // ========================
    // Interest
    // ========================

    /// Credit one period of interest to every account now. The scheduler
    /// calls the same path.
    pub async fn accrue_interest(&self) -> Result<InterestRun, AppError> {
        self.core.accrue_interest().await
    }

    // ========================
    // Statements
    // ========================

    /// Write a statement for the account and return its path.
    pub async fn generate_statement(&self, account_number: &str) -> Result<PathBuf, AppError> {
        let info = self.get_account_info(account_number).await?;

        tokio::fs::create_dir_all(&self.core.statement_dir)
            .await
            .map_err(|source| AppError::StatementWrite {
                path: self.core.statement_dir.clone(),
                source,
            })?;

        let path = write_statement(
            &self.core.statement_dir,
            &info.account,
            &info.owner,
            current_timestamp(),
        )
        .await?;
        info!("Wrote statement {}", path.display());
        Ok(path)
    }
}
