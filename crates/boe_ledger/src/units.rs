//! Conversion between integer base units and human decimal strings.
//!
//! Both directions are exact: the integer leg never passes through a float.

use alloy_primitives::U256;

use crate::error::LedgerError;

/// Decimal precision of the Bills of Exchange token.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Why a human-entered amount could not be converted to base units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("not a decimal number: {0}")]
    InvalidNumber(String),

    #[error("too many decimal places: {given} given, at most {max} allowed")]
    TooManyDecimals { given: usize, max: u8 },

    #[error("amount does not fit in 256 bits: {0}")]
    Overflow(String),
}

impl From<UnitsError> for LedgerError {
    fn from(err: UnitsError) -> Self {
        LedgerError::InvalidInput(err.to_string())
    }
}

/// Format `units` as a decimal string with `decimals` fractional digits,
/// trimming trailing zeros (`1000000000000000000, 18` → `"1"`).
pub fn to_human(units: U256, decimals: u8) -> String {
    let digits = units.to_string();
    if decimals == 0 {
        return digits;
    }

    let scale = decimals as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        let split = digits.len() - scale;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>scale$}"))
    };

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Parse a human decimal string into base units with `decimals` precision.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`. Signs, exponents, separators and
/// any other characters are rejected, as are more significant fractional
/// digits than `decimals` allows. Trailing fractional zeros are ignored.
pub fn to_units(human: &str, decimals: u8) -> Result<U256, UnitsError> {
    let input = human.trim();
    if input.is_empty() {
        return Err(UnitsError::Empty);
    }
    if input.starts_with('-') {
        return Err(UnitsError::Negative(input.to_string()));
    }

    let (int_part, frac_part) = match input.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (input, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(UnitsError::InvalidNumber(input.to_string()));
    }

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            given: frac_part.len(),
            max: decimals,
        });
    }

    let scale = decimals as usize;
    let mut digits = String::with_capacity(int_part.len() + scale);
    digits.push_str(int_part);
    digits.push_str(&format!("{frac_part:0<scale$}"));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| UnitsError::Overflow(input.to_string()))
}
