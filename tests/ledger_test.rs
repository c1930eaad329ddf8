mod common;

use std::collections::HashSet;

use anyhow::Result;
use common::{alice, bob, test_service};
use tally::application::AppError;
use tally::{AccountKind, Customer, TransactionType};

fn assert_balance_matches_history(account: &tally::Account) {
    let expected = account.last_transaction().map_or(0.0, |t| t.balance_after);
    assert_eq!(account.balance(), expected);
}

#[tokio::test]
async fn test_savings_walkthrough() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .create_account(AccountKind::Savings, alice())
        .await?;
    let number = account.account_number().to_string();
    assert_eq!(account.balance(), 0.0);
    assert_eq!(account.customer_id(), "C1");

    service.deposit(&number, 1000.0).await?;
    let snapshot = service.find_account(&number).await?;
    assert_eq!(snapshot.balance(), 1000.0);
    assert_eq!(snapshot.transactions().len(), 1);

    service.withdraw(&number, 300.0).await?;
    let snapshot = service.find_account(&number).await?;
    assert_eq!(snapshot.balance(), 700.0);
    assert_eq!(snapshot.transactions().len(), 2);

    let result = service.withdraw(&number, 800.0).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
    let snapshot = service.find_account(&number).await?;
    assert_eq!(snapshot.balance(), 700.0);
    assert_eq!(snapshot.transactions().len(), 2);

    let run = service.accrue_interest().await?;
    assert_eq!(run.credited.len(), 1);
    let snapshot = service.find_account(&number).await?;
    assert!((snapshot.balance() - 702.625).abs() < 1e-9);
    assert_eq!(snapshot.transactions().len(), 3);
    assert_eq!(snapshot.transactions()[2].kind, TransactionType::Interest);
    assert_balance_matches_history(&snapshot);

    Ok(())
}

#[tokio::test]
async fn test_deposit_and_withdraw_return_transactions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let number = service
        .create_account(AccountKind::Current, alice())
        .await?
        .account_number()
        .to_string();

    let deposit = service.deposit(&number, 250.5).await?;
    assert_eq!(deposit.kind, TransactionType::Deposit);
    assert_eq!(deposit.amount, 250.5);
    assert_eq!(deposit.balance_after, 250.5);

    let withdrawal = service.withdraw(&number, 50.5).await?;
    assert_eq!(withdrawal.kind, TransactionType::Withdrawal);
    assert_eq!(withdrawal.amount, -50.5);
    assert_eq!(withdrawal.balance_after, 200.0);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let number = service
        .create_account(AccountKind::Savings, alice())
        .await?
        .account_number()
        .to_string();
    service.deposit(&number, 100.0).await?;

    for amount in [0.0, -10.0] {
        assert!(matches!(
            service.deposit(&number, amount).await,
            Err(AppError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.withdraw(&number, amount).await,
            Err(AppError::InvalidAmount(_))
        ));
    }

    let snapshot = service.find_account(&number).await?;
    assert_eq!(snapshot.balance(), 100.0);
    assert_eq!(snapshot.transactions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unknown_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert!(matches!(
        service.find_account("ACC404").await,
        Err(AppError::AccountNotFound(n)) if n == "ACC404"
    ));
    assert!(matches!(
        service.deposit("ACC404", 10.0).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.withdraw("ACC404", 10.0).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.generate_statement("ACC404").await,
        Err(AppError::AccountNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_current_account_interest_rate() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let number = service
        .create_account(AccountKind::Current, alice())
        .await?
        .account_number()
        .to_string();
    service.deposit(&number, 1200.0).await?;

    let run = service.accrue_interest().await?;
    let credit = &run.credited[0];
    assert_eq!(credit.account_number, number);
    assert_eq!(credit.transaction.kind, TransactionType::Interest);
    assert_eq!(credit.transaction.amount, 1200.0 * (0.01 / 12.0));
    Ok(())
}

#[tokio::test]
async fn test_interest_skips_empty_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let empty = service
        .create_account(AccountKind::Savings, alice())
        .await?;
    let funded = service
        .create_account(AccountKind::Savings, bob())
        .await?;
    service.deposit(funded.account_number(), 100.0).await?;

    let run = service.accrue_interest().await?;
    assert_eq!(run.credited.len(), 1);
    assert_eq!(run.credited[0].account_number, funded.account_number());

    let empty = service.find_account(empty.account_number()).await?;
    assert!(empty.transactions().is_empty());
    assert_eq!(empty.balance(), 0.0);
    Ok(())
}

#[tokio::test]
async fn test_customer_is_registered_once() -> Result<()> {
    let (service, temp) = test_service().await?;

    let first = service
        .create_account(AccountKind::Savings, alice())
        .await?;
    let second = service
        .create_account(AccountKind::Current, alice())
        .await?;
    assert_ne!(first.account_number(), second.account_number());

    assert_eq!(service.list_customers().await, vec![alice()]);
    assert_eq!(service.get_customer("C1").await?, alice());
    assert_eq!(service.accounts_for_customer("C1").await?.len(), 2);

    let customers = common::read_store(temp.path(), tally::storage::CUSTOMERS_FILE);
    assert_eq!(customers.matches("=== CUSTOMER ===").count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_customer_conflict() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .create_account(AccountKind::Savings, alice())
        .await?;

    let impostor = Customer::new("C1", "Mallory", "", "");
    let result = service.create_account(AccountKind::Savings, impostor).await;
    assert!(matches!(result, Err(AppError::CustomerConflict(id)) if id == "C1"));
    assert_eq!(service.list_accounts().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_customer_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .create_account(AccountKind::Savings, Customer::new("", "Nobody", "", ""))
        .await;
    assert!(matches!(
        result,
        Err(AppError::InvalidCustomer { field: "id", .. })
    ));

    let result = service
        .create_account(
            AccountKind::Savings,
            Customer::new("C3", "Carol\n=== END CUSTOMER ===", "", ""),
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::InvalidCustomer { field: "name", .. })
    ));

    assert!(service.list_accounts().await.is_empty());
    assert!(service.list_customers().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    assert!(matches!(
        service.accounts_for_customer("C9").await,
        Err(AppError::CustomerNotFound(_))
    ));
    assert!(matches!(
        service.get_customer("C9").await,
        Err(AppError::CustomerNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_account_numbers_unique_under_rapid_creation() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut numbers = HashSet::new();
    for _ in 0..200 {
        let account = service
            .create_account(AccountKind::Current, alice())
            .await?;
        assert!(account.account_number().starts_with("ACC"));
        numbers.insert(account.account_number().to_string());
    }

    assert_eq!(numbers.len(), 200);
    Ok(())
}

#[tokio::test]
async fn test_snapshots_are_detached() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let number = service
        .create_account(AccountKind::Savings, alice())
        .await?
        .account_number()
        .to_string();

    let mut snapshot = service.find_account(&number).await?;
    snapshot.deposit(500.0).unwrap();

    let fresh = service.find_account(&number).await?;
    assert_eq!(fresh.balance(), 0.0);
    assert!(fresh.transactions().is_empty());
    Ok(())
}
