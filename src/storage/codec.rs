//! Text block format shared by the three stores.
//!
//! Every record is a begin marker, a fixed sequence of `Key: value` lines and
//! an end marker, followed by one blank line:
//!
//! ```text
//! === ACCOUNT ===
//! Number: ACC1700000000000-1a2b3c4d
//! Type: SavingsAccount
//! Balance: 702.625
//! CustomerID: C1
//! === END ACCOUNT ===
//! ```
//!
//! Parsing is strict: a block with a missing or out-of-order key is an error,
//! never a partially filled record.

use chrono::NaiveDateTime;

use crate::domain::{
    Account, AccountKind, AccountNumber, Amount, Customer, TIMESTAMP_FORMAT, Transaction,
    TransactionType, format_decimal, parse_amount,
};

/// Markers and key order of one record kind.
#[derive(Debug)]
pub struct BlockLayout {
    pub begin: &'static str,
    pub end: &'static str,
    pub keys: &'static [&'static str],
}

pub const CUSTOMER_LAYOUT: BlockLayout = BlockLayout {
    begin: "=== CUSTOMER ===",
    end: "=== END CUSTOMER ===",
    keys: &["ID", "Name", "Address", "Phone"],
};

pub const ACCOUNT_LAYOUT: BlockLayout = BlockLayout {
    begin: "=== ACCOUNT ===",
    end: "=== END ACCOUNT ===",
    keys: &["Number", "Type", "Balance", "CustomerID"],
};

pub const TRANSACTION_LAYOUT: BlockLayout = BlockLayout {
    begin: "=== TRANSACTION ===",
    end: "=== END TRANSACTION ===",
    keys: &["AccountNumber", "Timestamp", "Type", "Amount", "BalanceAfter"],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number in the store file
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for ParseError {}

/// Values of one block in layout key order, with the line of its begin marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub line: usize,
    pub values: Vec<String>,
}

/// Stored form of an account, before its owner and history are linked.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub number: AccountNumber,
    pub kind: AccountKind,
    pub balance: Amount,
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub account_number: AccountNumber,
    pub transaction: Transaction,
}

// ========================
// Encoding
// ========================

fn render_block(layout: &BlockLayout, values: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(layout.begin);
    out.push('\n');
    for (key, value) in layout.keys.iter().zip(values) {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(layout.end);
    out.push_str("\n\n");
    out
}

pub fn encode_customer(customer: &Customer) -> String {
    render_block(
        &CUSTOMER_LAYOUT,
        &[
            &customer.id,
            &customer.name,
            &customer.address,
            &customer.phone,
        ],
    )
}

pub fn encode_account(account: &Account) -> String {
    render_block(
        &ACCOUNT_LAYOUT,
        &[
            account.account_number(),
            account.kind().as_str(),
            &format_decimal(account.balance()),
            account.customer_id(),
        ],
    )
}

pub fn encode_transaction(account_number: &str, transaction: &Transaction) -> String {
    render_block(
        &TRANSACTION_LAYOUT,
        &[
            account_number,
            &transaction.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            transaction.kind.as_str(),
            &format_decimal(transaction.amount),
            &format_decimal(transaction.balance_after),
        ],
    )
}

// ========================
// Decoding
// ========================

/// Returns the value of a `Key: value` line, or `None` if the line holds another key.
fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Split a store into blocks of `layout`. Blank lines between blocks are skipped;
/// anything else outside a block is an error.
pub fn parse_blocks(text: &str, layout: &BlockLayout) -> Result<Vec<RawBlock>, ParseError> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    while let Some((start, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_end() != layout.begin {
            return Err(ParseError::new(
                start,
                format!("expected '{}', found '{}'", layout.begin, line),
            ));
        }

        let mut values = Vec::with_capacity(layout.keys.len());
        for key in layout.keys {
            let (number, line) = lines.next().ok_or_else(|| {
                ParseError::new(start, format!("block ends before its '{}' line", key))
            })?;
            let value = key_value(line, key).ok_or_else(|| {
                ParseError::new(number, format!("expected '{}:' line, found '{}'", key, line))
            })?;
            values.push(value.to_string());
        }

        match lines.next() {
            Some((_, line)) if line.trim_end() == layout.end => {}
            Some((number, line)) => {
                return Err(ParseError::new(
                    number,
                    format!("expected '{}', found '{}'", layout.end, line),
                ));
            }
            None => {
                return Err(ParseError::new(
                    start,
                    format!("block is missing '{}'", layout.end),
                ));
            }
        }

        blocks.push(RawBlock {
            line: start,
            values,
        });
    }

    Ok(blocks)
}

fn into_fields<const N: usize>(block: RawBlock) -> Result<(usize, [String; N]), ParseError> {
    let line = block.line;
    let fields: [String; N] = block
        .values
        .try_into()
        .map_err(|values: Vec<String>| {
            ParseError::new(line, format!("expected {} fields, found {}", N, values.len()))
        })?;
    Ok((line, fields))
}

fn decode_amount(line: usize, key: &str, value: &str) -> Result<Amount, ParseError> {
    parse_amount(value)
        .map_err(|e| ParseError::new(line, format!("{} '{}': {}", key, value, e)))
}

pub fn decode_customer(block: RawBlock) -> Result<Customer, ParseError> {
    let (_, [id, name, address, phone]) = into_fields(block)?;
    Ok(Customer {
        id,
        name,
        address,
        phone,
    })
}

pub fn decode_account(block: RawBlock) -> Result<AccountRecord, ParseError> {
    let (line, [number, kind, balance, customer_id]) = into_fields(block)?;
    let kind = AccountKind::from_str(&kind)
        .ok_or_else(|| ParseError::new(line, format!("unknown account type '{}'", kind)))?;
    let balance = decode_amount(line, "Balance", &balance)?;
    Ok(AccountRecord {
        number,
        kind,
        balance,
        customer_id,
    })
}

pub fn decode_transaction(block: RawBlock) -> Result<TransactionRecord, ParseError> {
    let (line, [account_number, timestamp, kind, amount, balance_after]) = into_fields(block)?;
    let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| ParseError::new(line, format!("Timestamp '{}': {}", timestamp, e)))?;
    let kind = TransactionType::from_str(&kind)
        .ok_or_else(|| ParseError::new(line, format!("unknown transaction type '{}'", kind)))?;
    let amount = decode_amount(line, "Amount", &amount)?;
    let balance_after = decode_amount(line, "BalanceAfter", &balance_after)?;
    Ok(TransactionRecord {
        account_number,
        transaction: Transaction::at(kind, amount, balance_after, timestamp),
    })
}

// ========================
// Rewrite
// ========================

/// Produce the new content of the account store: every block for
/// `account_number` (and the blank lines trailing it) is dropped, all other
/// bytes are kept as they are, and `fresh_block` is appended at the end.
pub fn replace_account_block(existing: &str, account_number: &str, fresh_block: &str) -> String {
    let mut out = String::with_capacity(existing.len() + fresh_block.len());
    let mut block = String::new();
    let mut in_block = false;
    let mut dropping = false;

    for line in existing.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);

        if !in_block {
            if content.trim_end() == ACCOUNT_LAYOUT.begin {
                in_block = true;
                dropping = false;
                block.clear();
                block.push_str(line);
            } else if !(dropping && content.trim().is_empty()) {
                dropping = false;
                out.push_str(line);
            }
            continue;
        }

        block.push_str(line);
        if key_value(content, "Number") == Some(account_number) {
            dropping = true;
        }
        if content.trim_end() == ACCOUNT_LAYOUT.end {
            in_block = false;
            if !dropping {
                out.push_str(&block);
            }
        }
    }

    // An unterminated tail is left for the loader to report.
    if in_block {
        out.push_str(&block);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(fresh_block);
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 15)
            .unwrap()
    }

    fn account_with_balance(number: &str, amount: Amount) -> Account {
        let mut account = Account::new(number.into(), AccountKind::Savings, "C1".into());
        account.deposit(amount).unwrap();
        account
    }

    #[test]
    fn test_encode_customer_layout() {
        let customer = Customer::new("C1", "Alice", "1 Main St", "555-0100");
        assert_eq!(
            encode_customer(&customer),
            "=== CUSTOMER ===\nID: C1\nName: Alice\nAddress: 1 Main St\nPhone: 555-0100\n=== END CUSTOMER ===\n\n"
        );
    }

    #[test]
    fn test_encode_transaction_layout() {
        let tx = Transaction::at(TransactionType::Withdrawal, -300.0, 700.0, timestamp());
        assert_eq!(
            encode_transaction("ACC1", &tx),
            "=== TRANSACTION ===\nAccountNumber: ACC1\nTimestamp: 2024-03-01 09:30:15\nType: Withdrawal\nAmount: -300.0\nBalanceAfter: 700.0\n=== END TRANSACTION ===\n\n"
        );
    }

    #[test]
    fn test_decode_encoded_blocks() {
        let customer = Customer::new("C1", "Alice", "", "555-0100");
        let blocks = parse_blocks(&encode_customer(&customer), &CUSTOMER_LAYOUT).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(decode_customer(blocks[0].clone()).unwrap(), customer);

        let tx = Transaction::at(TransactionType::Interest, 2.625, 702.625, timestamp());
        let blocks = parse_blocks(&encode_transaction("ACC1", &tx), &TRANSACTION_LAYOUT).unwrap();
        let record = decode_transaction(blocks[0].clone()).unwrap();
        assert_eq!(record.account_number, "ACC1");
        assert_eq!(record.transaction, tx);
    }

    #[test]
    fn test_parse_legacy_account_block() {
        let text = "=== ACCOUNT ===\nNumber: ACC1712345678901\nType: CurrentAccount\nBalance: 1500.0\nCustomerID: C9\n=== END ACCOUNT ===\n\n";
        let blocks = parse_blocks(text, &ACCOUNT_LAYOUT).unwrap();
        let record = decode_account(blocks[0].clone()).unwrap();
        assert_eq!(
            record,
            AccountRecord {
                number: "ACC1712345678901".into(),
                kind: AccountKind::Current,
                balance: 1500.0,
                customer_id: "C9".into(),
            }
        );
    }

    #[test]
    fn test_parse_accepts_crlf_and_empty_values() {
        let text = "=== CUSTOMER ===\r\nID: C1\r\nName: Bob\r\nAddress:\r\nPhone: \r\n=== END CUSTOMER ===\r\n";
        let blocks = parse_blocks(text, &CUSTOMER_LAYOUT).unwrap();
        let customer = decode_customer(blocks[0].clone()).unwrap();
        assert_eq!(customer, Customer::new("C1", "Bob", "", ""));
    }

    #[test]
    fn test_parse_missing_key_line() {
        let text = "=== CUSTOMER ===\nID: C1\nName: Bob\nPhone: 1\n=== END CUSTOMER ===\n";
        let err = parse_blocks(text, &CUSTOMER_LAYOUT).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.reason.contains("Address"));
    }

    #[test]
    fn test_parse_unterminated_block() {
        let text = "=== CUSTOMER ===\nID: C1\nName: Bob\nAddress: x\nPhone: 1\n";
        let err = parse_blocks(text, &CUSTOMER_LAYOUT).unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_parse_stray_text() {
        let text = "garbage\n";
        let err = parse_blocks(text, &ACCOUNT_LAYOUT).unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_decode_bad_values() {
        let text = "=== ACCOUNT ===\nNumber: A\nType: Checking\nBalance: 1.0\nCustomerID: C1\n=== END ACCOUNT ===\n";
        let block = parse_blocks(text, &ACCOUNT_LAYOUT).unwrap().remove(0);
        assert!(decode_account(block).unwrap_err().reason.contains("Checking"));

        let text = "=== ACCOUNT ===\nNumber: A\nType: SavingsAccount\nBalance: lots\nCustomerID: C1\n=== END ACCOUNT ===\n";
        let block = parse_blocks(text, &ACCOUNT_LAYOUT).unwrap().remove(0);
        assert!(decode_account(block).unwrap_err().reason.contains("Balance"));

        let text = "=== TRANSACTION ===\nAccountNumber: A\nTimestamp: yesterday\nType: Deposit\nAmount: 1.0\nBalanceAfter: 1.0\n=== END TRANSACTION ===\n";
        let block = parse_blocks(text, &TRANSACTION_LAYOUT).unwrap().remove(0);
        assert!(decode_transaction(block).unwrap_err().reason.contains("Timestamp"));
    }

    #[test]
    fn test_replace_keeps_other_blocks_byte_identical() {
        let first = encode_account(&account_with_balance("ACC1", 10.0));
        let second = encode_account(&account_with_balance("ACC2", 20.0));
        let third = encode_account(&account_with_balance("ACC3", 30.0));
        let existing = format!("{}{}{}", first, second, third);

        let fresh = encode_account(&account_with_balance("ACC2", 25.0));
        let rewritten = replace_account_block(&existing, "ACC2", &fresh);

        assert_eq!(rewritten, format!("{}{}{}", first, third, fresh));
    }

    #[test]
    fn test_replace_drops_duplicates_and_appends_missing() {
        let stale = encode_account(&account_with_balance("ACC1", 10.0));
        let other = encode_account(&account_with_balance("ACC2", 20.0));
        let existing = format!("{}{}{}", stale, other, stale);
        let fresh = encode_account(&account_with_balance("ACC1", 11.0));

        assert_eq!(
            replace_account_block(&existing, "ACC1", &fresh),
            format!("{}{}", other, fresh)
        );
        assert_eq!(replace_account_block("", "ACC1", &fresh), fresh);
    }

    #[test]
    fn test_replace_does_not_match_number_prefix() {
        let short = encode_account(&account_with_balance("ACC1", 10.0));
        let long = encode_account(&account_with_balance("ACC10", 20.0));
        let existing = format!("{}{}", short, long);
        let fresh = encode_account(&account_with_balance("ACC1", 12.0));

        assert_eq!(
            replace_account_block(&existing, "ACC1", &fresh),
            format!("{}{}", long, fresh)
        );
    }
}
