//! Contract template placeholder substitution.
//!
//! Templates carry `{{NAME}}` tokens (upper-case letters, digits and
//! underscores, optional inner whitespace). [`render`] replaces every token
//! whose name is present in the [`TemplateContext`] and leaves the rest in
//! place, reporting them so callers can log a warning.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::money;
use crate::types::{Date, Money};

/// Regex pattern matching `{{PLACEHOLDER}}` tokens.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Z][A-Z0-9_]*)\s*\}\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Placeholder names understood by contract templates.
pub mod placeholders {
    pub const PROJECT_TITLE: &str = "PROJECT_TITLE";
    pub const PROJECT_CODE: &str = "PROJECT_CODE";
    pub const PROJECT_APPROVED_AMOUNT: &str = "PROJECT_APPROVED_AMOUNT";
    pub const PROJECT_REQUESTED_AMOUNT: &str = "PROJECT_REQUESTED_AMOUNT";
    pub const APPLICANT_NAME: &str = "APPLICANT_NAME";
    pub const APPLICANT_TAX_ID: &str = "APPLICANT_TAX_ID";
    pub const APPLICANT_EMAIL: &str = "APPLICANT_EMAIL";
    pub const APPLICANT_PHONE: &str = "APPLICANT_PHONE";
    pub const APPLICANT_ADDRESS: &str = "APPLICANT_ADDRESS";
    pub const APPLICANT_CODE: &str = "APPLICANT_CODE";
    pub const CALL_TITLE: &str = "CALL_TITLE";
    pub const CONTRACT_VALUE: &str = "CONTRACT_VALUE";
    pub const VALIDITY_START: &str = "VALIDITY_START";
    pub const VALIDITY_END: &str = "VALIDITY_END";
    pub const CURRENT_DATE: &str = "CURRENT_DATE";
    pub const CURRENT_YEAR: &str = "CURRENT_YEAR";
}

/// Display format for dates inside contract text.
pub fn format_date(date: Date) -> String {
    date.format("%d/%m/%Y").to_string()
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Name → value map used for substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// The entity data a contract template draws from.
#[derive(Debug, Clone)]
pub struct ContractTemplateData<'a> {
    pub project_title: &'a str,
    pub project_code: &'a str,
    pub approved_amount: Option<Money>,
    pub requested_amount: Money,
    pub applicant_name: &'a str,
    pub applicant_tax_id: &'a str,
    pub applicant_email: &'a str,
    pub applicant_phone: Option<&'a str>,
    pub applicant_address: Option<&'a str>,
    pub applicant_code: &'a str,
    pub call_title: &'a str,
    pub contract_value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
    pub today: Date,
}

impl From<&ContractTemplateData<'_>> for TemplateContext {
    fn from(data: &ContractTemplateData<'_>) -> Self {
        use placeholders::*;

        let mut ctx = TemplateContext::new();
        ctx.insert(PROJECT_TITLE, data.project_title)
            .insert(PROJECT_CODE, data.project_code)
            .insert(
                PROJECT_APPROVED_AMOUNT,
                data.approved_amount.map(money::format_brl).unwrap_or_default(),
            )
            .insert(PROJECT_REQUESTED_AMOUNT, money::format_brl(data.requested_amount))
            .insert(APPLICANT_NAME, data.applicant_name)
            .insert(APPLICANT_TAX_ID, data.applicant_tax_id)
            .insert(APPLICANT_EMAIL, data.applicant_email)
            .insert(APPLICANT_PHONE, data.applicant_phone.unwrap_or_default())
            .insert(APPLICANT_ADDRESS, data.applicant_address.unwrap_or_default())
            .insert(APPLICANT_CODE, data.applicant_code)
            .insert(CALL_TITLE, data.call_title)
            .insert(CONTRACT_VALUE, money::format_brl(data.contract_value))
            .insert(VALIDITY_START, format_date(data.validity_start))
            .insert(VALIDITY_END, format_date(data.validity_end))
            .insert(CURRENT_DATE, format_date(data.today))
            .insert(CURRENT_YEAR, data.today.format("%Y").to_string());
        ctx
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub content: String,
    /// Placeholder names with no value in the context, deduplicated, in order
    /// of first appearance.
    pub unresolved: Vec<String>,
}

/// Substitute every known placeholder in `template`.
pub fn render(template: &str, ctx: &TemplateContext) -> RenderedTemplate {
    let mut unresolved: Vec<String> = Vec::new();

    let content = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match ctx.get(name) {
                Some(value) => value.to_string(),
                None => {
                    if !unresolved.iter().any(|n| n == name) {
                        unresolved.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    RenderedTemplate {
        content,
        unresolved,
    }
}

/// Names of every placeholder in `template`, deduplicated.
pub fn placeholders_in(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> ContractTemplateData<'static> {
        ContractTemplateData {
            project_title: "Teatro na Praça",
            project_code: "PRJ-2024-7-0001",
            approved_amount: Some(Decimal::from_str("8000").unwrap()),
            requested_amount: Decimal::from_str("10000").unwrap(),
            applicant_name: "Maria Souza",
            applicant_tax_id: "529.982.247-25",
            applicant_email: "maria@example.org",
            applicant_phone: None,
            applicant_address: Some("Rua A, 10"),
            applicant_code: "FT1123456",
            call_title: "Edital Cultura 2024",
            contract_value: Decimal::from_str("8000").unwrap(),
            validity_start: date(2024, 3, 1),
            validity_end: date(2024, 12, 31),
            today: date(2024, 2, 20),
        }
    }

    #[test]
    fn substitutes_known_placeholders() {
        let ctx = TemplateContext::from(&sample());
        let out = render(
            "Contrato {{PROJECT_CODE}} entre {{ APPLICANT_NAME }} e o edital {{CALL_TITLE}}, valor {{CONTRACT_VALUE}}, de {{VALIDITY_START}} a {{VALIDITY_END}} ({{CURRENT_YEAR}}).",
            &ctx,
        );
        assert_eq!(
            out.content,
            "Contrato PRJ-2024-7-0001 entre Maria Souza e o edital Edital Cultura 2024, valor R$ 8.000,00, de 01/03/2024 a 31/12/2024 (2024)."
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn missing_optional_values_render_empty() {
        let ctx = TemplateContext::from(&sample());
        let out = render("Tel: [{{APPLICANT_PHONE}}]", &ctx);
        assert_eq!(out.content, "Tel: []");
    }

    #[test]
    fn unknown_placeholders_are_kept_and_reported_once() {
        let ctx = TemplateContext::from(&sample());
        let out = render("{{WITNESS}} / {{WITNESS}} / {{CALL_TITLE}}", &ctx);
        assert_eq!(out.content, "{{WITNESS}} / {{WITNESS}} / Edital Cultura 2024");
        assert_eq!(out.unresolved, vec!["WITNESS"]);
    }

    #[test]
    fn lowercase_tokens_are_not_placeholders() {
        let ctx = TemplateContext::from(&sample());
        let out = render("{{project_title}}", &ctx);
        assert_eq!(out.content, "{{project_title}}");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn placeholders_in_lists_unique_names() {
        assert_eq!(
            placeholders_in("{{A}} {{B_2}} {{A}}"),
            vec!["A".to_string(), "B_2".to_string()]
        );
    }
}
