//! Value normalizer.
//!
//! Handles:
//! - Placeholder detection ("", "-", "—", "N/A")
//! - Numeric coercion with thousands separators ("1,234.5" → 1234.5)
//! - Escaping identifiers for exact-match `LIKE` queries

use crate::models::CellValue;

/// Escape character declared by every exact-match `LIKE` query.
pub const LIKE_ESCAPE: char = '\\';

/// Check whether a string is a placeholder for "no value".
pub fn is_placeholder_str(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || trimmed == "-"
        || trimmed == "—"
        || trimmed.eq_ignore_ascii_case("n/a")
}

/// Check whether a cell holds no usable value.
pub fn is_placeholder(value: &CellValue) -> bool {
    match value {
        CellValue::Null => true,
        CellValue::Number(_) => false,
        CellValue::Text(s) => is_placeholder_str(s),
    }
}

/// Parse a string as a finite number, ignoring thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    if is_placeholder_str(raw) {
        return None;
    }
    let cleaned = raw.trim().replace(',', "");
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Coerce a cell to a finite number.
pub fn to_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Null => None,
        CellValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
        CellValue::Text(s) => parse_number(s),
    }
}

/// Escape `%`, `_` and the escape character itself so `s` matches literally
/// in a `LIKE ... ESCAPE '\'` query.
pub fn escape_exact_pattern(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        for raw in ["", "   ", "-", " - ", "—", "N/A", "n/a", " n/A "] {
            assert!(is_placeholder_str(raw), "{:?} should be a placeholder", raw);
        }
        assert!(is_placeholder(&CellValue::Null));
        assert!(!is_placeholder(&CellValue::Number(0.0)));
        assert!(!is_placeholder(&CellValue::text("0")));
        assert!(!is_placeholder(&CellValue::text("negative")));
        assert!(!is_placeholder(&CellValue::text("--")));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("95"), Some(95.0));
        assert_eq!(parse_number(" 4.5 "), Some(4.5));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("12,345.6"), Some(12345.6));
        assert_eq!(parse_number("-0.5"), Some(-0.5));
    }

    #[test]
    fn test_parse_number_rejects() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("positive"), None);
        assert_eq!(parse_number("1+"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&CellValue::Number(7.0)), Some(7.0));
        assert_eq!(to_number(&CellValue::Number(f64::NAN)), None);
        assert_eq!(to_number(&CellValue::text("1,000")), Some(1000.0));
        assert_eq!(to_number(&CellValue::Null), None);
    }

    #[test]
    fn test_escape_exact_pattern() {
        assert_eq!(escape_exact_pattern("SATOH010596"), "SATOH010596");
        assert_eq!(escape_exact_pattern("100%"), "100\\%");
        assert_eq!(escape_exact_pattern("a_b"), "a\\_b");
        assert_eq!(escape_exact_pattern("a\\b"), "a\\\\b");
        assert_eq!(escape_exact_pattern("_%\\"), "\\_\\%\\\\");
    }
}
