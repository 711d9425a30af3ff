use std::fmt;

/// Money is represented as integer paise so ledger arithmetic never drifts.
/// 1 INR = 100 paise, so ₹850.00 = 85000 paise.
pub type Paise = i64;

/// Format paise as a rupee amount with two decimals.
/// Example: 85000 -> "850.00", -1234 -> "-12.34"
pub fn format_paise(paise: Paise) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal rupee string into paise.
/// Example: "850.00" -> 85000, "12.5" -> 1250, "100" -> 10000
///
/// More than two decimal places is rejected instead of truncated: a ledger
/// amount that cannot be represented exactly must not be accepted.
pub fn parse_paise(input: &str) -> Result<Paise, ParsePaiseError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParsePaiseError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParsePaiseError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParsePaiseError::InvalidFormat)?
    };

    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<i64>().map_err(|_| ParsePaiseError::InvalidFormat)? * 10,
        2 => fraction_str
            .parse()
            .map_err(|_| ParsePaiseError::InvalidFormat)?,
        _ => return Err(ParsePaiseError::TooPrecise),
    };

    let paise = units
        .checked_mul(100)
        .and_then(|p| p.checked_add(fraction))
        .ok_or(ParsePaiseError::OutOfRange)?;
    Ok(if negative { -paise } else { paise })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePaiseError {
    InvalidFormat,
    TooPrecise,
    OutOfRange,
}

impl fmt::Display for ParsePaiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsePaiseError::InvalidFormat => write!(f, "invalid money format"),
            ParsePaiseError::TooPrecise => write!(f, "at most two decimal places are allowed"),
            ParsePaiseError::OutOfRange => write!(f, "amount is out of range"),
        }
    }
}

impl std::error::Error for ParsePaiseError {}
