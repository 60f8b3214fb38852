//! Sanitisation primitives for user-edited values.

/// Trimmed text, or an empty string when absent.
pub fn sanitize(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Trimmed text, with blank collapsing to `None`.
pub fn sanitize_nullable(value: Option<&str>) -> Option<String> {
    Some(sanitize(value)).filter(|s| !s.is_empty())
}

/// Prefer the explicit user value, then the candidate's prior value.
pub fn resolve_bool(value: Option<bool>, fallback: Option<bool>) -> Option<bool> {
    value.or(fallback)
}

/// Trim every entry and drop the blank ones, preserving order.
pub fn sanitize_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_defaults() {
        assert_eq!(sanitize(Some("  Acme  ")), "Acme");
        assert_eq!(sanitize(None), "");
    }

    #[test]
    fn nullable_collapses_blank() {
        assert_eq!(sanitize_nullable(Some("   ")), None);
        assert_eq!(sanitize_nullable(None), None);
        assert_eq!(
            sanitize_nullable(Some(" https://github.com/acme ")),
            Some("https://github.com/acme".into())
        );
    }

    #[test]
    fn explicit_bool_wins_even_when_false() {
        assert_eq!(resolve_bool(Some(false), Some(true)), Some(false));
        assert_eq!(resolve_bool(None, Some(true)), Some(true));
        assert_eq!(resolve_bool(None, None), None);
    }

    #[test]
    fn list_drops_blank_entries() {
        assert_eq!(
            sanitize_list(["Infrastructure", "", "  DeFi "]),
            vec!["Infrastructure".to_string(), "DeFi".to_string()]
        );
    }
}
