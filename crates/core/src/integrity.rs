//! Contract document integrity hash.
//!
//! The digest is shown to the signer and stored with the signature, and
//! third parties may recompute it later, so the byte encoding is fixed:
//!
//! ```text
//! cultura-contract-v1\n
//! <len>:<contract_number>\n
//! <len>:<content>\n
//! <len>:<value, two fraction digits>\n
//! <len>:<validity_start, YYYY-MM-DD>\n
//! <len>:<validity_end, YYYY-MM-DD>\n
//! ```
//!
//! `<len>` is the UTF-8 byte length of the value that follows. The digest is
//! lowercase hex SHA-256 over those bytes.

use crate::error::CoreError;
use crate::hashing::{digests_equal, sha256_hex};
use crate::money;
use crate::types::{Date, DbId, Money};

/// First line of the canonical encoding. Bump when the layout changes.
pub const ENCODING_VERSION: &str = "cultura-contract-v1";

/// The persisted contract fields covered by the hash.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFields<'a> {
    pub contract_number: &'a str,
    pub content: &'a str,
    pub value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
}

/// Serialize the fields in their canonical order and encoding.
pub fn canonical_bytes(fields: &DocumentFields<'_>) -> Vec<u8> {
    let value = money::canonical(fields.value);
    let start = fields.validity_start.format("%Y-%m-%d").to_string();
    let end = fields.validity_end.format("%Y-%m-%d").to_string();

    let parts: [&str; 5] = [fields.contract_number, fields.content, &value, &start, &end];

    let mut out = Vec::with_capacity(
        ENCODING_VERSION.len() + 1 + parts.iter().map(|p| p.len() + 8).sum::<usize>(),
    );
    out.extend_from_slice(ENCODING_VERSION.as_bytes());
    out.push(b'\n');
    for part in parts {
        out.extend_from_slice(part.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(part.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Hex SHA-256 digest of the canonical encoding.
pub fn document_hash(fields: &DocumentFields<'_>) -> String {
    sha256_hex(&canonical_bytes(fields))
}

/// Recompute the hash and compare it with `expected`.
pub fn verify(contract_id: DbId, fields: &DocumentFields<'_>, expected: &str) -> Result<(), CoreError> {
    let actual = document_hash(fields);
    if digests_equal(&actual, &expected.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(CoreError::IntegrityMismatch {
            contract_id,
            expected: expected.to_string(),
            actual,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture(value: &str) -> (Decimal, Date, Date) {
        (
            Decimal::from_str(value).unwrap(),
            date(2024, 3, 1),
            date(2024, 12, 31),
        )
    }

    #[test]
    fn known_digest_is_stable() {
        let (value, start, end) = fixture("10000");
        let fields = DocumentFields {
            contract_number: "CONT-2024-0001",
            content: "Contrato de fomento",
            value,
            validity_start: start,
            validity_end: end,
        };
        assert_eq!(
            document_hash(&fields),
            "7d8c3dd31847b28cf4a582c6bc352243cee5443fda8759fe7c5e39596c066849"
        );
    }

    #[test]
    fn value_scale_does_not_change_the_digest() {
        let (a, start, end) = fixture("10000");
        let (b, _, _) = fixture("10000.00");
        let base = DocumentFields {
            contract_number: "CONT-2024-0001",
            content: "body",
            value: a,
            validity_start: start,
            validity_end: end,
        };
        let scaled = DocumentFields { value: b, ..base };
        assert_eq!(document_hash(&base), document_hash(&scaled));
    }

    #[test]
    fn every_field_contributes() {
        let (value, start, end) = fixture("500.50");
        let base = DocumentFields {
            contract_number: "CONT-2024-0002",
            content: "body",
            value,
            validity_start: start,
            validity_end: end,
        };
        let h = document_hash(&base);

        let variants = [
            DocumentFields { contract_number: "CONT-2024-0003", ..base },
            DocumentFields { content: "body.", ..base },
            DocumentFields { value: Decimal::from_str("500.51").unwrap(), ..base },
            DocumentFields { validity_start: date(2024, 3, 2), ..base },
            DocumentFields { validity_end: date(2025, 1, 1), ..base },
        ];
        for variant in variants {
            assert_ne!(document_hash(&variant), h);
        }
    }

    #[test]
    fn length_prefix_prevents_boundary_shifting() {
        let (value, start, end) = fixture("1");
        let a = DocumentFields {
            contract_number: "CONT-1",
            content: "2 body",
            value,
            validity_start: start,
            validity_end: end,
        };
        let b = DocumentFields {
            contract_number: "CONT-1\n2",
            content: "body",
            ..a
        };
        assert_ne!(document_hash(&a), document_hash(&b));
    }

    #[test]
    fn verify_reports_both_digests() {
        let (value, start, end) = fixture("10");
        let fields = DocumentFields {
            contract_number: "CONT-2024-0009",
            content: "x",
            value,
            validity_start: start,
            validity_end: end,
        };
        let good = document_hash(&fields);
        assert!(verify(9, &fields, &good).is_ok());
        assert!(verify(9, &fields, &good.to_uppercase()).is_ok());

        assert_matches!(
            verify(9, &fields, "deadbeef"),
            Err(CoreError::IntegrityMismatch { contract_id: 9, expected, actual })
                if expected == "deadbeef" && actual == good
        );
    }
}
