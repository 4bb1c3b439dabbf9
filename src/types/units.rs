//! Unit Conversion Utilities
//!
//! Decimal token amounts as typed by a user, and the atomic integers the
//! ledgers work with. No floating point on either side.

/// Largest decimals value we accept (keeps 10^decimals inside u128)
pub const MAX_DECIMALS: u8 = 24;

/// Unit conversion errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("amount is not a number: {0}")]
    NotANumber(String),

    #[error("amount has more than {0} decimal places")]
    TooPrecise(u8),

    #[error("amount is too large")]
    Overflow,

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("unsupported decimals: {0}")]
    UnsupportedDecimals(u8),
}

/// 10^decimals
pub fn scale(decimals: u8) -> Result<u128, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals(decimals));
    }
    Ok(10u128.pow(decimals as u32))
}

/// Convert a decimal string ("100", "0.25", "1,000.5") to an atomic amount
///
/// Commas are accepted only as thousands separators in the whole part.
/// Rejects zero: every caller of this needs a positive transfer amount.
pub fn to_atomic(amount: &str, decimals: u8) -> Result<u128, UnitsError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (grouped, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    let whole = ungroup(grouped).ok_or_else(|| UnitsError::NotANumber(amount.to_string()))?;

    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::NotANumber(amount.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(UnitsError::NotANumber(amount.to_string()));
    }

    // Trailing zeros past the token's precision are harmless
    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooPrecise(decimals));
    }

    let unit = scale(decimals)?;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitsError::Overflow)?
    };

    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| UnitsError::Overflow)?
    };

    let atomic = whole_value
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(UnitsError::Overflow)?;

    if atomic == 0 {
        return Err(UnitsError::NotPositive);
    }

    Ok(atomic)
}

/// Strip thousands separators from the whole part
///
/// `None` unless every group after the first has exactly three digits and
/// the first has one to three.
fn ungroup(whole: &str) -> Option<String> {
    if !whole.contains(',') {
        return Some(whole.to_string());
    }

    let mut groups = whole.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 {
        return None;
    }

    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

/// Format an atomic amount as a decimal string ("1000000", 6 -> "1")
pub fn format_atomic(atomic: u128, decimals: u8) -> String {
    if decimals == 0 {
        return atomic.to_string();
    }

    let digits = format!("{:0>width$}", atomic, width = decimals as usize + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals as usize);
    let frac = frac.trim_end_matches('0');

    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
