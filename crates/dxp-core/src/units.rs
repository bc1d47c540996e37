// SPDX-License-Identifier: AGPL-3.0-only
//! Token unit conversion.
//!
//! Amounts are carried as `u128` atomic units everywhere. These helpers turn
//! human decimal strings (`"9.87"`) into atomic units and back, integer-only.

use thiserror::Error;

/// Decimal places used by every token the fixture deploys.
pub const DECIMALS: u32 = 18;

/// One whole token in atomic units (10^18).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Highest decimals value whose scale (10^decimals) fits in `u128`.
const MAX_DECIMALS: u32 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount: {0}")]
    InvalidDigit(String),
    #[error("amount {amount} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u32 },
    #[error("amount {0} overflows u128")]
    Overflow(String),
    #[error("unsupported decimals: {0}")]
    UnsupportedDecimals(u32),
}

fn scale(decimals: u32) -> Result<u128, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals(decimals));
    }
    Ok(10u128.pow(decimals))
}

fn parse_digits(digits: &str, original: &str) -> Result<u128, UnitsError> {
    let mut value: u128 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            return Err(UnitsError::InvalidDigit(original.to_string()));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as u128))
            .ok_or_else(|| UnitsError::Overflow(original.to_string()))?;
    }
    Ok(value)
}

/// Parse a decimal string into atomic units with `decimals` fractional digits.
///
/// `parse_units("1.5", 18) == 1_500_000_000_000_000_000`. Underscores are
/// accepted as digit separators. Fractional digits beyond `decimals` are an
/// error rather than being truncated.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128, UnitsError> {
    let cleaned: String = amount.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(UnitsError::Empty);
    }
    let unit = scale(decimals)?;

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::InvalidDigit(amount.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    let whole_value = if whole.is_empty() {
        0
    } else {
        parse_digits(whole, amount)?
    };
    let frac_value = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        parse_digits(&padded, amount)?
    };

    whole_value
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| UnitsError::Overflow(amount.to_string()))
}

/// Format atomic units as a decimal string, trimming trailing zeros but
/// always keeping one fractional digit (`"10.0"`, `"9.871580343970612988"`).
pub fn format_units(value: u128, decimals: u32) -> String {
    let unit = match scale(decimals) {
        Ok(u) => u,
        Err(_) => return value.to_string(),
    };
    if decimals == 0 {
        return value.to_string();
    }
    let whole = value / unit;
    let frac = value % unit;
    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

/// `parse_units(amount, 18)`.
pub fn parse_ether(amount: &str) -> Result<u128, UnitsError> {
    parse_units(amount, DECIMALS)
}

/// `format_units(value, 18)`.
pub fn format_ether(value: u128) -> String {
    format_units(value, DECIMALS)
}
