//! Monetary amount helpers.
//!
//! Amounts are `NUMERIC(15,2)` in the database and [`Money`] in Rust. Two
//! renderings exist: the canonical form used inside document hashes and the
//! Brazilian display form used in contract text.

use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::types::Money;

/// Largest value a `NUMERIC(15,2)` column accepts.
pub fn max_amount() -> Money {
    Decimal::new(9_999_999_999_999_99, 2)
}

/// Canonical rendering: two fraction digits, `.` separator, no grouping.
pub fn canonical(value: Money) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Display rendering in Brazilian reais, e.g. `R$ 1.234,56`.
pub fn format_brl(value: Money) -> String {
    let text = canonical(value);
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {grouped},{frac_part}")
}

/// Require `value > 0` with at most two fraction digits.
pub fn ensure_positive(field: &str, value: Money) -> Result<(), CoreError> {
    if value <= Decimal::ZERO {
        return Err(CoreError::validation(field, "must be greater than zero"));
    }
    ensure_representable(field, value)
}

/// Require `value >= 0` with at most two fraction digits.
pub fn ensure_non_negative(field: &str, value: Money) -> Result<(), CoreError> {
    if value < Decimal::ZERO {
        return Err(CoreError::validation(field, "must not be negative"));
    }
    ensure_representable(field, value)
}

fn ensure_representable(field: &str, value: Money) -> Result<(), CoreError> {
    if value.round_dp(2) != value {
        return Err(CoreError::validation(
            field,
            "must have at most two decimal places",
        ));
    }
    if value > max_amount() {
        return Err(CoreError::validation(field, "exceeds the maximum amount"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;

    use super::*;

    fn dec(s: &str) -> Money {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn canonical_always_has_two_fraction_digits() {
        assert_eq!(canonical(dec("10000")), "10000.00");
        assert_eq!(canonical(dec("12.5")), "12.50");
        assert_eq!(canonical(dec("0.1")), "0.10");
    }

    #[test]
    fn brl_groups_thousands() {
        assert_eq!(format_brl(dec("1234.56")), "R$ 1.234,56");
        assert_eq!(format_brl(dec("1000000")), "R$ 1.000.000,00");
        assert_eq!(format_brl(dec("999")), "R$ 999,00");
        assert_eq!(format_brl(dec("-50.5")), "-R$ 50,50");
    }

    #[test]
    fn positive_rejects_zero_and_excess_precision() {
        assert_matches!(
            ensure_positive("value", Decimal::ZERO),
            Err(CoreError::Validation { field, .. }) if field == "value"
        );
        assert!(ensure_positive("value", dec("10.001")).is_err());
        assert!(ensure_positive("value", dec("10.01")).is_ok());
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert!(ensure_non_negative("counterpart_amount", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("counterpart_amount", dec("-1")).is_err());
    }
}
