//! Brazilian tax id (CPF / CNPJ) normalization and checksum validation.

use crate::error::CoreError;
use crate::status::LegalKind;

pub const CPF_LEN: usize = 11;
pub const CNPJ_LEN: usize = 14;

const CNPJ_WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Strip punctuation, keeping only ASCII digits.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn digits(normalized: &str) -> Vec<u32> {
    normalized.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(d: &[u32]) -> bool {
    d.windows(2).all(|w| w[0] == w[1])
}

/// Checksum test for an 11-digit individual tax id.
pub fn is_valid_cpf(raw: &str) -> bool {
    let d = digits(&normalize(raw));
    if d.len() != CPF_LEN || all_same(&d) {
        return false;
    }
    (9..11).all(|t| {
        let sum: u32 = (0..t).map(|c| d[c] * ((t as u32 + 1) - c as u32)).sum();
        (10 * sum) % 11 % 10 == d[t]
    })
}

/// Checksum test for a 14-digit organization tax id.
pub fn is_valid_cnpj(raw: &str) -> bool {
    let d = digits(&normalize(raw));
    if d.len() != CNPJ_LEN || all_same(&d) {
        return false;
    }
    let check = |weights: &[u32], position: usize| {
        let remainder = weights.iter().zip(&d).map(|(w, x)| w * x).sum::<u32>() % 11;
        let expected = if remainder < 2 { 0 } else { 11 - remainder };
        d[position] == expected
    };
    check(&CNPJ_WEIGHTS_FIRST, 12) && check(&CNPJ_WEIGHTS_SECOND, 13)
}

/// Validate `raw` for the given legal kind and return the digits-only form.
pub fn validate(kind: LegalKind, raw: &str) -> Result<String, CoreError> {
    let normalized = normalize(raw);
    let valid = match kind {
        LegalKind::Individual => is_valid_cpf(&normalized),
        LegalKind::Organization => is_valid_cnpj(&normalized),
    };
    if valid {
        Ok(normalized)
    } else {
        let label = match kind {
            LegalKind::Individual => "CPF",
            LegalKind::Organization => "CNPJ",
        };
        Err(CoreError::validation("tax_id", format!("invalid {label}")))
    }
}

/// Punctuated display form (`000.000.000-00` / `00.000.000/0000-00`).
pub fn format(normalized: &str) -> String {
    match normalized.len() {
        CPF_LEN => format!(
            "{}.{}.{}-{}",
            &normalized[0..3],
            &normalized[3..6],
            &normalized[6..9],
            &normalized[9..11]
        ),
        CNPJ_LEN => format!(
            "{}.{}.{}/{}-{}",
            &normalized[0..2],
            &normalized[2..5],
            &normalized[5..8],
            &normalized[8..12],
            &normalized[12..14]
        ),
        _ => normalized.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn valid_cpfs() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("12345678909"));
    }

    #[test]
    fn invalid_cpfs() {
        assert!(!is_valid_cpf("529.982.247-24"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234567890"));
    }

    #[test]
    fn valid_and_invalid_cnpjs() {
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(is_valid_cnpj("04252011000110"));
        assert!(!is_valid_cnpj("11.222.333/0001-80"));
        assert!(!is_valid_cnpj("00000000000000"));
    }

    #[test]
    fn validate_checks_the_kind() {
        assert_eq!(
            validate(LegalKind::Individual, "529.982.247-25").unwrap(),
            "52998224725"
        );
        assert_matches!(
            validate(LegalKind::Organization, "529.982.247-25"),
            Err(CoreError::Validation { field, message }) if field == "tax_id" && message.contains("CNPJ")
        );
    }

    #[test]
    fn display_format() {
        assert_eq!(format("52998224725"), "529.982.247-25");
        assert_eq!(format("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format("123"), "123");
    }
}
