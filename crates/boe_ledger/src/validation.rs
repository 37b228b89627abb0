//! Keystroke-level validation of user-entered addresses and amounts.
//!
//! Everything here is pure: no network, no logging, same answer for the same
//! input. Failures are values, never errors, so a form can render them inline.

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::units::{UnitsError, to_units};

pub const MSG_ADDRESS_PROMPT: &str = "Input ETH address";
pub const MSG_ADDRESS_VALID: &str = "Valid address";
pub const MSG_ADDRESS_INVALID: &str = "Not a valid ETH address";
pub const MSG_AMOUNT_PROMPT: &str = "Input amount";

/// Tri-state outcome of validating the current input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationState {
    Unset,
    Valid,
    Invalid,
}

/// Validation result for an address field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressValidation {
    pub state: ValidationState,
    pub message: String,
    /// The parsed address when `state` is `Valid`.
    pub address: Option<Address>,
    /// `false` only for mixed-case input whose EIP-55 checksum does not match.
    pub checksum_ok: bool,
}

impl AddressValidation {
    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }
}

/// Validate `input` as a 20-byte hex account address.
///
/// The checksum is best-effort: a mixed-case address with a wrong checksum is
/// still `Valid`, with [`AddressValidation::checksum_ok`] set to `false`.
pub fn validate_address(input: &str) -> AddressValidation {
    let value = input.trim();
    if value.is_empty() {
        return AddressValidation {
            state: ValidationState::Unset,
            message: MSG_ADDRESS_PROMPT.to_string(),
            address: None,
            checksum_ok: true,
        };
    }

    let invalid = || AddressValidation {
        state: ValidationState::Invalid,
        message: MSG_ADDRESS_INVALID.to_string(),
        address: None,
        checksum_ok: false,
    };

    let Some(body) = value.strip_prefix("0x") else {
        return invalid();
    };
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return invalid();
    }
    let Ok(address) = Address::from_str(value) else {
        return invalid();
    };

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let checksum_ok = !(has_lower && has_upper) || address.to_checksum(None) == value;

    AddressValidation {
        state: ValidationState::Valid,
        message: MSG_ADDRESS_VALID.to_string(),
        address: Some(address),
        checksum_ok,
    }
}

/// Parse an address or fail with [`LedgerError::InvalidInput`].
pub fn parse_address(input: &str) -> Result<Address, LedgerError> {
    let validation = validate_address(input);
    validation
        .address
        .ok_or_else(|| LedgerError::InvalidInput(format!("{}: {:?}", validation.message, input.trim())))
}

/// Validation result for an amount field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountValidation {
    pub state: ValidationState,
    pub message: String,
    /// Base-unit value when `state` is `Valid`.
    pub units: Option<U256>,
}

impl AmountValidation {
    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }
}

/// Validate a human-entered token amount.
///
/// Submission is blocked for anything that is not a strictly positive number
/// representable with `decimals` fractional digits; zero is never silently
/// accepted as a no-op transfer.
pub fn validate_amount(input: &str, decimals: u8) -> AmountValidation {
    let invalid = |message: String| AmountValidation {
        state: ValidationState::Invalid,
        message,
        units: None,
    };

    match to_units(input, decimals) {
        Ok(units) if units.is_zero() => invalid("Amount must be greater than 0".to_string()),
        Ok(units) => AmountValidation {
            state: ValidationState::Valid,
            message: "Valid amount".to_string(),
            units: Some(units),
        },
        Err(UnitsError::Empty) => AmountValidation {
            state: ValidationState::Unset,
            message: MSG_AMOUNT_PROMPT.to_string(),
            units: None,
        },
        Err(UnitsError::Negative(_)) => invalid("Amount must be greater than 0".to_string()),
        Err(e) => invalid(format!("Not a valid amount: {e}")),
    }
}

/// Shorten an address for display: `0x1234…abcd`.
pub fn truncate_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_char_boundary(6) || !address.is_char_boundary(address.len() - 4) {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn empty_is_unset() {
        let v = validate_address("");
        assert_eq!(v.state, ValidationState::Unset);
        assert_eq!(v.message, MSG_ADDRESS_PROMPT);
        assert_eq!(validate_address("   ").state, ValidationState::Unset);
    }

    #[test]
    fn forty_hex_chars_are_valid() {
        let v = validate_address("0xabc0000000000000000000000000000000000123");
        assert_eq!(v.state, ValidationState::Valid);
        assert_eq!(v.message, MSG_ADDRESS_VALID);
        assert!(v.address.is_some());
        assert!(v.checksum_ok);
    }

    #[test]
    fn short_address_is_invalid() {
        let v = validate_address("0x123");
        assert_eq!(v.state, ValidationState::Invalid);
        assert_eq!(v.message, MSG_ADDRESS_INVALID);
        assert!(v.address.is_none());
    }

    #[test]
    fn missing_prefix_and_bad_chars_are_invalid() {
        assert_eq!(
            validate_address("abc0000000000000000000000000000000000123").state,
            ValidationState::Invalid
        );
        assert_eq!(
            validate_address("0xzzz0000000000000000000000000000000000123").state,
            ValidationState::Invalid
        );
        assert_eq!(
            validate_address("0xabc00000000000000000000000000000000001234").state,
            ValidationState::Invalid
        );
    }

    #[test]
    fn checksum_is_best_effort() {
        let good = validate_address(CHECKSUMMED);
        assert!(good.is_valid());
        assert!(good.checksum_ok);

        // Flip the case of one letter: still an address, checksum now wrong.
        let bad = CHECKSUMMED.replacen("aA", "AA", 1);
        let v = validate_address(&bad);
        assert!(v.is_valid());
        assert!(!v.checksum_ok);

        let lower = validate_address(&CHECKSUMMED.to_lowercase());
        assert!(lower.checksum_ok);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(validate_address(&format!("  {CHECKSUMMED}\n")).is_valid());
    }

    #[test]
    fn parse_address_reports_input() {
        assert!(parse_address(CHECKSUMMED).is_ok());
        let err = parse_address("0x123").unwrap_err();
        assert!(err.to_string().contains("0x123"));
    }

    #[test]
    fn amount_validation_policy() {
        let v = validate_amount("1.5", 18);
        assert!(v.is_valid());
        assert_eq!(v.units, Some(U256::from(1_500_000_000_000_000_000u128)));

        assert_eq!(validate_amount("", 18).state, ValidationState::Unset);
        assert_eq!(validate_amount("0", 18).state, ValidationState::Invalid);
        assert_eq!(validate_amount("0.000", 18).state, ValidationState::Invalid);
        assert_eq!(validate_amount("-3", 18).state, ValidationState::Invalid);
        assert_eq!(validate_amount("ten", 18).state, ValidationState::Invalid);
        assert_eq!(validate_amount("0.001", 2).state, ValidationState::Invalid);
    }

    #[test]
    fn invalid_amount_message_is_descriptive() {
        let v = validate_amount("0.001", 2);
        assert!(v.message.contains("decimal places"), "{}", v.message);
        assert_eq!(validate_amount("0", 18).message, "Amount must be greater than 0");
    }

    #[test]
    fn truncate_address_display() {
        assert_eq!(truncate_address(CHECKSUMMED), "0x5aAe…eAed");
        assert_eq!(truncate_address("0x12"), "0x12");
        assert_eq!(truncate_address(""), "");
    }
}
