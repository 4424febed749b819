//! Helpers for list endpoints: paging bounds and `ILIKE` patterns.

/// Default page size for list queries.
pub const DEFAULT_LIMIT: i64 = 50;

/// Hard upper bound on page size.
pub const MAX_LIMIT: i64 = 200;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Build a `%term%` pattern for `ILIKE`, escaping the wildcard characters.
///
/// Returns `None` for blank input so callers can skip the predicate.
pub fn ilike_pattern(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return None;
    }
    let escaped = trimmed
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

/// Case-insensitive substring match with the same semantics as [`ilike_pattern`].
pub fn matches_term(haystack: &str, term: &str) -> bool {
    let trimmed = term.trim();
    trimmed.is_empty() || haystack.to_lowercase().contains(&trimmed.to_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None, 50, 200), 50);
        assert_eq!(clamp_limit(Some(0), 50, 200), 1);
        assert_eq!(clamp_limit(Some(1000), 50, 200), 200);
    }

    #[test]
    fn offset_is_never_negative() {
        assert_eq!(clamp_offset(Some(-4)), 0);
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(20)), 20);
    }

    #[test]
    fn ilike_pattern_escapes_wildcards() {
        assert_eq!(ilike_pattern("  "), None);
        assert_eq!(ilike_pattern("50%_off").as_deref(), Some("%50\\%\\_off%"));
    }

    #[test]
    fn matches_term_is_case_insensitive() {
        assert!(matches_term("Festival de Teatro", "teatro"));
        assert!(matches_term("anything", ""));
        assert!(!matches_term("Festival", "danca"));
    }
}
