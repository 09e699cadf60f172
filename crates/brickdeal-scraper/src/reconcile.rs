//! Candidate reconciliation: dedupe, plausibility filtering against the
//! known list price, score adjustment, and final ranking.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::candidates::PriceCandidate;
use crate::normalize::{availability_to_in_stock, strip_html_tags};

/// Fraction of the reference price below which a candidate is implausible
/// (usually a unit price or an accessory that leaked into the page).
const PLAUSIBILITY_FLOOR: f64 = 0.30;
/// Ratio below which a surviving candidate is still suspicious.
const LOW_RATIO: f64 = 0.45;
/// Ratio above which a candidate likely belongs to a different variant.
const HIGH_RATIO: f64 = 1.8;

const HEAVY_PENALTY: i32 = 60;
const LIGHT_PENALTY: i32 = 25;
const HIGH_PENALTY: i32 = 15;

/// The reconciled winning price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinningPrice {
    pub cents: i64,
    pub source: &'static str,
}

/// Picks one winning price out of the union of both extraction passes.
///
/// Duplicate cents values collapse to their highest-scored reading. When a
/// reference price is known, candidates below 30% of it are discarded —
/// unless that would discard everything, in which case the floor is skipped
/// so a page never loses its only reading to the filter. Remaining scores
/// are penalized by distance from the reference, then ranked: adjusted
/// score, closeness to reference, higher raw price.
#[must_use]
pub fn reconcile(candidates: &[PriceCandidate], msrp_cents: Option<i64>) -> Option<WinningPrice> {
    if candidates.is_empty() {
        return None;
    }

    let mut by_cents: HashMap<i64, PriceCandidate> = HashMap::new();
    for candidate in candidates {
        by_cents
            .entry(candidate.cents)
            .and_modify(|kept| {
                if candidate.score > kept.score {
                    *kept = *candidate;
                }
            })
            .or_insert(*candidate);
    }
    let mut pool: Vec<PriceCandidate> = by_cents.into_values().collect();

    let msrp = msrp_cents.filter(|m| *m > 0);
    if let Some(msrp) = msrp {
        let floor = ratio_of(msrp, PLAUSIBILITY_FLOOR);
        let filtered: Vec<PriceCandidate> =
            pool.iter().copied().filter(|c| c.cents >= floor).collect();
        if !filtered.is_empty() {
            pool = filtered;
        }
    }

    let adjusted = |c: &PriceCandidate| -> i32 {
        let Some(msrp) = msrp else {
            return c.score;
        };
        #[allow(clippy::cast_precision_loss)]
        let ratio = c.cents as f64 / msrp as f64;
        if ratio < PLAUSIBILITY_FLOOR {
            c.score - HEAVY_PENALTY
        } else if ratio < LOW_RATIO {
            c.score - LIGHT_PENALTY
        } else if ratio > HIGH_RATIO {
            c.score - HIGH_PENALTY
        } else {
            c.score
        }
    };

    pool.sort_by(|a, b| {
        adjusted(b).cmp(&adjusted(a)).then_with(|| {
            if let Some(msrp) = msrp {
                let da = (a.cents - msrp).abs();
                let db = (b.cents - msrp).abs();
                da.cmp(&db).then(b.cents.cmp(&a.cents))
            } else {
                b.cents.cmp(&a.cents)
            }
        })
    });

    pool.first().map(|c| WinningPrice {
        cents: c.cents,
        source: c.source,
    })
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn ratio_of(msrp: i64, fraction: f64) -> i64 {
    (msrp as f64 * fraction).round() as i64
}

static AVAILABILITY_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)id=["']availability["'][^>]*>(.*?)</div>"#).expect("valid regex")
});
static AVAILABILITY_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(In Stock|Currently unavailable|Out of stock|Temporarily out of stock)")
        .expect("valid regex")
});

/// Resolves the stock flag: structured availability first, then a text scan
/// of the page, then "a price was found, assume purchasable", else unknown.
#[must_use]
pub fn resolve_in_stock(
    structured_availability: Option<&str>,
    html: &str,
    price_found: bool,
) -> Option<bool> {
    if let Some(flag) = structured_availability.and_then(availability_to_in_stock) {
        return Some(flag);
    }
    if let Some(flag) = availability_from_html(html) {
        return Some(flag);
    }
    if price_found {
        return Some(true);
    }
    None
}

fn availability_from_html(html: &str) -> Option<bool> {
    if let Some(inner) = AVAILABILITY_DIV_RE.captures(html).and_then(|c| c.get(1)) {
        if let Some(flag) = availability_to_in_stock(&strip_html_tags(inner.as_str())) {
            return Some(flag);
        }
    }
    AVAILABILITY_PHRASE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| availability_to_in_stock(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(cents: i64, score: i32) -> PriceCandidate {
        PriceCandidate {
            cents,
            score,
            source: "test",
        }
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(reconcile(&[], Some(10_000)), None);
    }

    #[test]
    fn duplicates_collapse_to_the_highest_score() {
        let pool = [
            PriceCandidate { cents: 4999, score: 20, source: "dollar-text" },
            PriceCandidate { cents: 4999, score: 90, source: "ld-offer-price" },
        ];
        let winner = reconcile(&pool, None).unwrap();
        assert_eq!(winner.source, "ld-offer-price");
    }

    #[test]
    fn plausibility_floor_discards_implausible_lows() {
        // Reference 100.00: a 20.00 reading (unit price leakage) loses to a
        // 95.00 reading even though it scored higher.
        let pool = [candidate(2000, 50), candidate(9500, 40)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 9500);
    }

    #[test]
    fn floor_is_skipped_rather_than_returning_nothing() {
        let pool = [candidate(2000, 50)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 2000);
    }

    #[test]
    fn low_ratio_candidates_are_penalized_not_dropped() {
        // 40% of reference survives the floor but takes the light penalty,
        // losing to an at-reference candidate with a slightly lower score.
        let pool = [candidate(4000, 55), candidate(9900, 45)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 9900);
    }

    #[test]
    fn far_above_reference_is_penalized_as_wrong_variant() {
        let pool = [candidate(25_000, 50), candidate(9900, 45)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 9900);
    }

    #[test]
    fn ties_break_by_closeness_to_reference_then_higher_price() {
        let pool = [candidate(9000, 50), candidate(9900, 50)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 9900);

        // Equidistant: the higher price wins.
        let pool = [candidate(9500, 50), candidate(10_500, 50)];
        let winner = reconcile(&pool, Some(10_000)).unwrap();
        assert_eq!(winner.cents, 10_500);

        // No reference: tie-break straight to the higher price.
        let pool = [candidate(4999, 50), candidate(5999, 50)];
        let winner = reconcile(&pool, None).unwrap();
        assert_eq!(winner.cents, 5999);
    }

    #[test]
    fn structured_availability_wins_over_text() {
        let html = r#"<div id="availability"><span>Currently unavailable.</span></div>"#;
        assert_eq!(
            resolve_in_stock(Some("http://schema.org/InStock"), html, false),
            Some(true)
        );
    }

    #[test]
    fn availability_div_is_scanned_before_phrases() {
        let html = r#"<div id="availability"><span>In Stock</span></div>"#;
        assert_eq!(resolve_in_stock(None, html, false), Some(true));

        let html = r#"<p>Currently unavailable.</p>"#;
        assert_eq!(resolve_in_stock(None, html, false), Some(false));
    }

    #[test]
    fn price_found_defaults_to_in_stock() {
        assert_eq!(resolve_in_stock(None, "<html></html>", true), Some(true));
        assert_eq!(resolve_in_stock(None, "<html></html>", false), None);
    }
}
