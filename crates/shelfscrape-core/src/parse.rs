//! Format-tolerant parsing of numeric page fields.
//!
//! Every function here fails soft: a value that does not match the expected
//! shape becomes `None` instead of failing the whole record.

use std::sync::OnceLock;

use regex::Regex;

/// Highest average rating the site can display.
const MAX_RATING: f64 = 5.0;

/// Parse a count such as `"1,234,567 ratings"` by keeping only the digits.
pub fn parse_count(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parse an average rating such as `"4.27"` or `"4.27 avg rating"`.
///
/// Rounded to two decimal places; values outside `0..=5` are rejected.
pub fn parse_rating(raw: &str) -> Option<f64> {
    let caps = number_re().captures(raw)?;
    let normalized = caps.get(0)?.as_str().replace(',', ".");
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || !(0.0..=MAX_RATING).contains(&value) {
        return None;
    }
    Some((value * 100.0).round() / 100.0)
}

/// Find the publication year in free text.
///
/// Prefers `"First published ... 1960"` over a plain `"Published ... 2002"`,
/// matching how detail pages distinguish original and edition dates.
pub fn parse_year(raw: &str) -> Option<i32> {
    static FIRST: OnceLock<Regex> = OnceLock::new();
    static ANY: OnceLock<Regex> = OnceLock::new();
    let first = FIRST.get_or_init(|| {
        Regex::new(r"(?is)first\s+published.*?\b(\d{4})\b").expect("valid regex")
    });
    let any = ANY
        .get_or_init(|| Regex::new(r"(?is)published.*?\b(\d{4})\b").expect("valid regex"));

    first
        .captures(raw)
        .or_else(|| any.captures(raw))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Star rating of a single review, from labels such as
/// `"Rating 4 out of 5"` or `"4 stars"`.
pub fn parse_review_stars(raw: &str) -> Option<u8> {
    let caps = number_re().captures(raw)?;
    let value: f64 = caps.get(0)?.as_str().replace(',', ".").parse().ok()?;
    let stars = value.round();
    if (1.0..=5.0).contains(&stars) {
        Some(stars as u8)
    } else {
        None
    }
}

fn number_re() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"))
}

/// Collapse runs of whitespace and trim. Empty results become `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_strip_non_digits() {
        assert_eq!(parse_count("1,234,567 ratings"), Some(1_234_567));
        assert_eq!(parse_count("  42\u{a0}reviews"), Some(42));
        assert_eq!(parse_count("no ratings yet"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn count_overflow_fails_soft() {
        assert_eq!(parse_count("99999999999999999999999"), None);
    }

    #[test]
    fn ratings() {
        assert_eq!(parse_rating("4.27"), Some(4.27));
        assert_eq!(parse_rating(" 3.456 avg rating "), Some(3.46));
        assert_eq!(parse_rating("4,1"), Some(4.1));
        assert_eq!(parse_rating("5"), Some(5.0));
        assert_eq!(parse_rating("7.5"), None);
        assert_eq!(parse_rating("n/a"), None);
    }

    #[test]
    fn years_prefer_first_published() {
        assert_eq!(
            parse_year("Published 2006 by Grand Central. First published July 11, 1960"),
            Some(1960)
        );
        assert_eq!(parse_year("First published\n   January 1, 1925"), Some(1925));
        assert_eq!(parse_year("Published May 2002 by Scholastic"), Some(2002));
        assert_eq!(parse_year("Hardcover, 320 pages"), None);
    }

    #[test]
    fn review_stars() {
        assert_eq!(parse_review_stars("Rating 4 out of 5"), Some(4));
        assert_eq!(parse_review_stars("5 stars"), Some(5));
        assert_eq!(parse_review_stars("Rating 0 out of 5"), None);
        assert_eq!(parse_review_stars("liked it"), None);
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a \n\t b  "), Some("a b".to_string()));
        assert_eq!(clean_text(" \n "), None);
    }
}
