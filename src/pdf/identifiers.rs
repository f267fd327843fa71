//! arXiv and DOI extraction from page fulltext.

use once_cell::sync::Lazy;
use regex::Regex;

/// Modern or legacy arXiv id, with its `arXiv:` prefix
static ARXIV_PREFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:arxiv):\s*(?:\d{4}\.\d{4,5}(?:v\d+)?|[a-z\-]+(?:\.[A-Z]{2})?/\d{7}(?:v\d+)?)")
        .unwrap()
});

/// Legacy archive-prefixed id such as `hep-th/9901001v2` or `math.GT/0309136`
static ARXIV_LEGACY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z\-]+(?:\.[A-Z]{2})?/\d{7}(?:v\d+)?").unwrap());

static DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+").unwrap());

/// Remove an `arXiv:` prefix and every whitespace character
fn normalize_arxiv(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let without_prefix = match trimmed.get(..6) {
        Some(head) if head.eq_ignore_ascii_case("arxiv:") => &trimmed[6..],
        _ => trimmed,
    };
    without_prefix.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Extract an arXiv identifier.
///
/// Only `arXiv:`-prefixed ids count. The first such match wins when it is a
/// modern `YYMM.NNNNN` id. Otherwise the text from that match onwards is
/// searched again for a legacy `archive/NNNNNNN` id.
///
/// ```
/// use entry_scrape::pdf::extract_arxiv;
///
/// assert_eq!(
///     extract_arxiv("arXiv:2106.12345v2 [cs.CL] 3 Jun 2021").as_deref(),
///     Some("2106.12345v2")
/// );
/// ```
pub fn extract_arxiv(text: &str) -> Option<String> {
    let m = ARXIV_PREFIXED.find(text)?;
    let id = normalize_arxiv(m.as_str());
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(id);
    }

    // Only text from the stamp onwards; bare paths elsewhere are URLs
    ARXIV_LEGACY
        .find(&text[m.start()..])
        .map(|legacy| normalize_arxiv(legacy.as_str()))
        .filter(|id| !id.is_empty())
}

/// Extract the first DOI.
///
/// A single trailing `,`, `.` or `/` picked up from the surrounding sentence
/// is dropped from the match.
pub fn extract_doi(text: &str) -> Option<String> {
    let matched = DOI.find(text)?;
    let mut doi: String = matched
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if doi.ends_with([',', '.', '/']) {
        doi.pop();
    }
    Some(doi)
}
