//! Text and number normalizers shared by both extraction passes.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TITLE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-?\s*Amazon\.com.*$").expect("valid regex"));

/// Converts a scraped price value to integer cents.
///
/// Integer JSON numbers are taken as already-cents; fractional numbers are
/// dollars. Strings go through [`parse_money_str`].
#[must_use]
pub fn parse_money_to_cents(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().map(|f| (f * 100.0).round() as i64)
            }
        }
        Value::String(s) => parse_money_str(s),
        _ => None,
    }
}

/// Converts a price string (e.g. `"$19.99"`) to integer cents.
///
/// Everything except digits and `.` is stripped. A value with a decimal
/// point, or a bare integer below 1000, is read as dollars; larger bare
/// integers are read as already-cents. The `< 1000` cutoff is ambiguous for
/// inputs like `"500"` but is relied on by equality comparisons against
/// persisted prices, so it must not change.
#[must_use]
pub fn parse_money_str(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let n: f64 = cleaned.parse().ok()?;
    if cleaned.contains('.') || n < 1000.0 {
        Some((n * 100.0).round() as i64)
    } else {
        Some(n.round() as i64)
    }
}

/// Maps an availability string to a tri-state stock flag. Matches both
/// schema.org tokens (`InStock`) and display text (`"In Stock"`).
#[must_use]
pub fn availability_to_in_stock(raw: &str) -> Option<bool> {
    let s = raw.to_lowercase();
    if s.contains("instock") || s.contains("in stock") {
        return Some(true);
    }
    if s.contains("outofstock")
        || s.contains("out of stock")
        || s.contains("unavailable")
        || s.contains("temporarily out")
    {
        return Some(false);
    }
    None
}

/// Removes tag markup and collapses whitespace.
#[must_use]
pub fn strip_html_tags(html: &str) -> String {
    let no_tags = TAG_RE.replace_all(html, " ");
    WS_RE.replace_all(&no_tags, " ").trim().to_owned()
}

/// Strips tags and retailer boilerplate suffixes from a listing title.
#[must_use]
pub fn clean_listing_title(raw: &str) -> String {
    let text = strip_html_tags(raw);
    TITLE_SUFFIX_RE.replace(&text, "").trim().to_owned()
}
