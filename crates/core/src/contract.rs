//! Contract (contrato) rules: numbering, status graph and term validation.

use crate::error::CoreError;
use crate::money;
use crate::status::{ContractKind, ContractStatus};
use crate::types::{Date, Money};

/// Entity name used in errors and audit records.
pub const ENTITY: &str = "Contract";

/// Zero-padded width of the yearly sequence in a contract number.
pub const NUMBER_SEQUENCE_WIDTH: usize = 4;

/// `{prefix}-{year}-{seq}`, e.g. `CONT-2024-0001`.
pub fn format_contract_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!(
        "{prefix}-{year}-{sequence:0width$}",
        width = NUMBER_SEQUENCE_WIDTH
    )
}

// ---------------------------------------------------------------------------
// Status graph
// ---------------------------------------------------------------------------

pub fn can_transition(from: ContractStatus, to: ContractStatus) -> bool {
    use ContractStatus::*;
    matches!(
        (from, to),
        (Draft, Sent)
            | (Draft | Sent, Signed)
            | (Signed, Active)
            | (Signed | Active, Expired | Terminated)
    )
}

pub fn ensure_transition(from: ContractStatus, to: ContractStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition(ENTITY, from, to))
    }
}

/// Statuses a signature may be captured in.
pub fn is_signable(status: ContractStatus) -> bool {
    matches!(status, ContractStatus::Draft | ContractStatus::Sent)
}

/// Content and terms are editable until the contract is signed.
pub fn is_editable(status: ContractStatus) -> bool {
    is_signable(status)
}

/// Statuses that keep an execution contract "live" for its project.
pub fn is_live(status: ContractStatus) -> bool {
    !matches!(status, ContractStatus::Terminated | ContractStatus::Expired)
}

/// Whether a contract occupies the project's single execution slot.
pub fn occupies_execution_slot(kind: ContractKind, status: ContractStatus) -> bool {
    kind == ContractKind::Execution && is_live(status)
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

pub fn validate_terms(value: Money, validity_start: Date, validity_end: Date) -> Result<(), CoreError> {
    money::ensure_positive("value", value)?;
    if validity_start >= validity_end {
        return Err(CoreError::validation(
            "validity_end",
            "must be later than validity_start",
        ));
    }
    Ok(())
}

/// A signed or active contract past its end date.
pub fn has_lapsed(status: ContractStatus, validity_end: Date, today: Date) -> bool {
    matches!(status, ContractStatus::Signed | ContractStatus::Active) && validity_end < today
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn contract_number_format() {
        assert_eq!(format_contract_number("CONT", 2024, 1), "CONT-2024-0001");
        assert_eq!(format_contract_number("CONT", 2025, 37), "CONT-2025-0037");
    }

    #[test]
    fn signed_is_terminal_for_signing() {
        use ContractStatus::*;
        assert!(can_transition(Draft, Signed));
        assert!(can_transition(Sent, Signed));
        assert!(!can_transition(Signed, Sent));
        assert!(!can_transition(Signed, Draft));
        assert!(!can_transition(Signed, Signed));
        assert!(!can_transition(Terminated, Signed));
    }

    #[test]
    fn administrative_exits() {
        use ContractStatus::*;
        assert!(can_transition(Signed, Terminated));
        assert!(can_transition(Active, Expired));
        assert!(!can_transition(Draft, Expired));
    }

    #[test]
    fn execution_slot() {
        use ContractStatus::*;
        assert!(occupies_execution_slot(ContractKind::Execution, Draft));
        assert!(occupies_execution_slot(ContractKind::Execution, Signed));
        assert!(!occupies_execution_slot(ContractKind::Execution, Terminated));
        assert!(!occupies_execution_slot(ContractKind::Execution, Expired));
        assert!(!occupies_execution_slot(ContractKind::Amendment, Draft));
    }

    #[test]
    fn terms_require_positive_value_and_ordered_dates() {
        let v = Decimal::new(1_000_000, 2);
        assert!(validate_terms(v, date(2024, 3, 1), date(2024, 12, 31)).is_ok());
        assert_matches!(
            validate_terms(Decimal::ZERO, date(2024, 3, 1), date(2024, 12, 31)),
            Err(CoreError::Validation { field, .. }) if field == "value"
        );
        assert_matches!(
            validate_terms(v, date(2024, 3, 1), date(2024, 3, 1)),
            Err(CoreError::Validation { field, .. }) if field == "validity_end"
        );
    }

    #[test]
    fn lapse_detection() {
        let end = date(2024, 12, 31);
        assert!(has_lapsed(ContractStatus::Signed, end, date(2025, 1, 1)));
        assert!(!has_lapsed(ContractStatus::Signed, end, end));
        assert!(!has_lapsed(ContractStatus::Sent, end, date(2025, 1, 1)));
    }
}
