use std::fmt;

/// Money is carried as `f64`, the same as the legacy data files.
pub type Amount = f64;

/// Format an amount for humans, rounded to two decimals.
/// Example: 702.625 -> "702.63", -300.0 -> "-300.00"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", amount)
}

/// Format an amount for storage: the shortest string that parses back to the
/// same `f64`, always with a fractional part.
/// Example: 1000.0 -> "1000.0", 702.625 -> "702.625"
pub fn format_decimal(amount: Amount) -> String {
    format!("{:?}", amount)
}

/// Parse a decimal string typed by a user or read from a store.
/// Example: "50.00" -> 50.0, "12.5" -> 12.5, "-300.0" -> -300.0
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ParseAmountError::InvalidFormat)?;
    if !value.is_finite() {
        return Err(ParseAmountError::NotFinite);
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    NotFinite,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::NotFinite => write!(f, "amount must be a finite number"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
