//! Stable identifiers.
//!
//! A book's key is a pure function of its detail-page URL: query string,
//! fragment and the descriptive slug after the numeric id are ignored, so
//! every variant of one book's URL maps to the same key. Review keys hash
//! the owning book key together with the raw text.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{IngestError, Result};

/// Prefix used when none is configured.
pub const DEFAULT_ID_PREFIX: &str = "GR_";

/// Separates the book key from the review text inside the hash input.
const HASH_SEPARATOR: u8 = 0x1f;

/// Derive the book key for a detail-page URL.
///
/// `https://site/book/show/123-Some-Title?ref=x` and
/// `https://site/book/show/123` both yield `{prefix}123`.
///
/// # Errors
///
/// [`IngestError::MalformedInput`] when the URL does not parse, has no
/// non-empty path segment, or its last segment has no numeric prefix.
pub fn derive_book_id(prefix: &str, url: &str) -> Result<String> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| IngestError::MalformedInput(format!("{url}: {e}")))?;

    let last = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| IngestError::MalformedInput(format!("{url}: no path segment")))?;

    let digits: String = last.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(IngestError::MalformedInput(format!(
            "{url}: last path segment '{last}' has no numeric id"
        )));
    }

    Ok(format!("{prefix}{digits}"))
}

/// Strip the query string and fragment. Unparseable input is returned
/// trimmed but otherwise untouched.
pub fn canonical_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Content hash keying a review: SHA-256 over the book key and raw text.
pub fn review_hash(book_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(book_id.as_bytes());
    hasher.update([HASH_SEPARATOR]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(url: &str) -> Result<String> {
        derive_book_id(DEFAULT_ID_PREFIX, url)
    }

    #[test]
    fn ignores_query_and_slug() {
        assert_eq!(
            id("https://site/book/show/123-Some-Title?ref=x").unwrap(),
            id("https://site/book/show/123").unwrap()
        );
        assert_eq!(id("https://site/book/show/123").unwrap(), "GR_123");
    }

    #[test]
    fn dotted_slug_and_trailing_slash() {
        assert_eq!(id("https://site/book/show/2657.To_Kill_a_Mockingbird").unwrap(), "GR_2657");
        assert_eq!(id("https://site/book/show/2657/").unwrap(), "GR_2657");
        assert_eq!(id("https://site/book/show/2657#reviews").unwrap(), "GR_2657");
    }

    #[test]
    fn idempotent() {
        let url = "https://www.goodreads.com/book/show/4671.The_Great_Gatsby?from_search=true";
        let a = id(url).unwrap();
        let b = id(url).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_prefix() {
        assert_eq!(derive_book_id("", "https://site/book/show/9-x").unwrap(), "9");
    }

    #[test]
    fn no_path_segment_is_malformed() {
        for url in ["https://site", "https://site/", "https://site/?page=2"] {
            match id(url) {
                Err(IngestError::MalformedInput(_)) => {}
                other => panic!("expected MalformedInput for {url}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unparseable_and_non_numeric_are_malformed() {
        assert!(matches!(id("not a url"), Err(IngestError::MalformedInput(_))));
        assert!(matches!(id("/book/show/123"), Err(IngestError::MalformedInput(_))));
        assert!(matches!(
            id("https://site/book/show/Some-Title"),
            Err(IngestError::MalformedInput(_))
        ));
    }

    #[test]
    fn canonical_url_strips_query_and_fragment() {
        assert_eq!(
            canonical_url("https://site/book/show/1-a?ref=x#top"),
            "https://site/book/show/1-a"
        );
        assert_eq!(canonical_url("  nonsense "), "nonsense");
    }

    #[test]
    fn review_hash_depends_on_book_and_text() {
        let a = review_hash("GR_1", "Loved it");
        assert_eq!(a, review_hash("GR_1", "Loved it"));
        assert_ne!(a, review_hash("GR_2", "Loved it"));
        assert_ne!(a, review_hash("GR_1", "Loved it!"));
        // The separator keeps ("GR_1", "2x") apart from ("GR_12", "x").
        assert_ne!(review_hash("GR_1", "2x"), review_hash("GR_12", "x"));
        assert_eq!(a.len(), 64);
    }
}
