//! Candidate price extraction: two independent passes over a fetched page.
//!
//! Pass A reads flattened structured-data nodes; Pass B runs an ordered
//! table of raw-text patterns. Both emit scored [`PriceCandidate`]s with
//! provenance tags; the reconciler picks the winner.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use brickdeal_core::Retailer;

use crate::normalize::{parse_money_str, parse_money_to_cents};
use crate::structured::str_field;

/// A scored price reading. `cents` is always positive; zero and negative
/// readings are discarded at the source. `source` is a provenance tag for
/// logs only and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCandidate {
    pub cents: i64,
    pub score: i32,
    pub source: &'static str,
}

/// Output of the structured pass: candidates plus the first availability
/// string seen on any node or offer.
#[derive(Debug, Default)]
pub struct StructuredScan {
    pub candidates: Vec<PriceCandidate>,
    pub availability: Option<String>,
}

// Structured-pass scores. Offer-level fields outrank node-level ones, and a
// seller whose name matches the retailer being scraped gets a boost so that
// marketplace "other sellers" offers lose ties against first-party ones.
const SCORE_OFFER_PRICE: i32 = 90;
const SCORE_NODE_PRICE: i32 = 88;
const SCORE_OFFER_SPEC: i32 = 85;
const SCORE_NODE_SPEC: i32 = 82;
const SCORE_LOW_PRICE: i32 = 80;
const SCORE_NODE_LOW: i32 = 78;
const SCORE_HIGH_PRICE: i32 = 70;
const SCORE_NODE_HIGH: i32 = 68;
const SELLER_MATCH_BOOST: i32 = 10;

/// Pass A: scan flattened structured-data nodes for price and availability.
#[must_use]
pub fn structured_candidates(nodes: &[Value], retailer: Retailer) -> StructuredScan {
    let mut scan = StructuredScan::default();

    for node in nodes {
        if let Some(offers) = node.get("offers") {
            match offers {
                Value::Array(items) => {
                    for offer in items {
                        scan_offer(offer, retailer, &mut scan);
                    }
                }
                Value::Object(_) => scan_offer(offers, retailer, &mut scan),
                _ => {}
            }
        }

        // Some pages put the offer fields straight on the product node.
        push_price(&mut scan.candidates, node.get("price"), SCORE_NODE_PRICE, "ld-node-price");
        push_spec_price(&mut scan.candidates, node, SCORE_NODE_SPEC, "ld-node-price-spec");
        push_price(&mut scan.candidates, node.get("lowPrice"), SCORE_NODE_LOW, "ld-node-low-price");
        push_price(&mut scan.candidates, node.get("highPrice"), SCORE_NODE_HIGH, "ld-node-high-price");
        capture_availability(node, &mut scan.availability);
    }

    scan
}

fn scan_offer(offer: &Value, retailer: Retailer, scan: &mut StructuredScan) {
    let boost = if seller_matches(offer, retailer) {
        SELLER_MATCH_BOOST
    } else {
        0
    };

    push_price(
        &mut scan.candidates,
        offer.get("price"),
        SCORE_OFFER_PRICE + boost,
        "ld-offer-price",
    );
    push_spec_price(&mut scan.candidates, offer, SCORE_OFFER_SPEC + boost, "ld-offer-price-spec");
    push_price(
        &mut scan.candidates,
        offer.get("lowPrice"),
        SCORE_LOW_PRICE + boost,
        "ld-offer-low-price",
    );
    push_price(
        &mut scan.candidates,
        offer.get("highPrice"),
        SCORE_HIGH_PRICE + boost,
        "ld-offer-high-price",
    );
    capture_availability(offer, &mut scan.availability);
}

fn push_price(out: &mut Vec<PriceCandidate>, value: Option<&Value>, score: i32, source: &'static str) {
    if let Some(cents) = value.and_then(parse_money_to_cents) {
        if cents > 0 {
            out.push(PriceCandidate { cents, score, source });
        }
    }
}

/// `priceSpecification.price`, skipped when the spec describes a per-unit
/// price rather than the listing price.
fn push_spec_price(out: &mut Vec<PriceCandidate>, node: &Value, score: i32, source: &'static str) {
    let Some(spec) = node.get("priceSpecification") else {
        return;
    };
    if is_unit_price_spec(spec) {
        return;
    }
    push_price(out, spec.get("price"), score, source);
}

/// Detects per-unit price specifications via the type name or the presence
/// of unit/quantity fields.
fn is_unit_price_spec(spec: &Value) -> bool {
    if !spec.is_object() {
        return false;
    }
    let type_name = str_field(spec, "@type")
        .or_else(|| str_field(spec, "priceType"))
        .unwrap_or("");
    if type_name.to_lowercase().contains("unitprice") {
        return true;
    }
    ["unitCode", "unitText", "referenceQuantity", "unitQuantity"]
        .iter()
        .any(|key| spec.get(*key).is_some())
}

fn seller_matches(offer: &Value, retailer: Retailer) -> bool {
    let Some(seller) = offer.get("seller") else {
        return false;
    };
    let name = seller
        .as_str()
        .or_else(|| str_field(seller, "name"))
        .unwrap_or("");
    name.to_lowercase()
        .contains(&retailer.as_str().to_lowercase())
}

fn capture_availability(node: &Value, slot: &mut Option<String>) {
    if slot.is_none() {
        if let Some(availability) = str_field(node, "availability") {
            *slot = Some(availability.to_owned());
        }
    }
}

// ---------------------------------------------------------------------------
// Pass B: raw-text patterns
// ---------------------------------------------------------------------------

struct TextPattern {
    re: Regex,
    score: i32,
    source: &'static str,
    /// Promotional-banner exclusion applies only to the broadest generic
    /// pattern; high-confidence widget patterns keep matches near "save"
    /// badges because the widget id itself is the signal.
    check_promo: bool,
}

static TEXT_PATTERNS: LazyLock<Vec<TextPattern>> = LazyLock::new(|| {
    let pattern = |re: &str, score: i32, source: &'static str, check_promo: bool| TextPattern {
        re: Regex::new(re).expect("valid price pattern"),
        score,
        source,
        check_promo,
    };
    vec![
        pattern(
            r#"(?is)id=["']priceblock_(?:our|deal|sale|pospromo)price["'][^>]*>\s*([^<]+)"#,
            80,
            "amazon-priceblock",
            false,
        ),
        pattern(
            r#"(?is)class=["'][^"']*apexPriceToPay[^"']*["'][^>]*>.{0,400}?<span[^>]*class=["'][^"']*a-offscreen[^"']*["'][^>]*>([^<]+)"#,
            75,
            "amazon-apex-offscreen",
            false,
        ),
        pattern(
            r#"(?is)class=["'][^"']*a-price[^"']*["'][^>]*>.{0,400}?<span[^>]*class=["'][^"']*a-offscreen[^"']*["'][^>]*>([^<]+)"#,
            70,
            "amazon-offscreen",
            false,
        ),
        pattern(
            r#"(?i)itemprop=["']price["'][^>]*content=["']([^"']+)["']"#,
            65,
            "itemprop-content",
            false,
        ),
        pattern(
            r#"(?is)itemprop=["']price["'][^>]*>\s*([^<]+)"#,
            63,
            "itemprop-text",
            false,
        ),
        pattern(r#""price"\s*:\s*"(\d+(?:\.\d+)?)""#, 60, "embedded-json-price", false),
        pattern(
            r#"(?s)"priceToPay"\s*:\s*\{\s*"value"\s*:\s*"?(\d+(?:\.\d+)?)"?"#,
            60,
            "embedded-price-to-pay",
            false,
        ),
        pattern(
            r"\$\s?(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)",
            20,
            "dollar-text",
            true,
        ),
    ]
});

static PRICE_WHOLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)class=["']a-price-whole["']>\s*([\d,.]+)"#).expect("valid regex")
});
static PRICE_FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)class=["']a-price-fraction["']>\s*(\d{2})"#).expect("valid regex")
});

const UNIT_CONTEXTS: &[&str] = &[
    "priceperunit",
    "price-per-unit",
    "unitprice",
    "unit-price",
    "per ounce",
    "per oz",
    "per lb",
    "per count",
    "per item",
    "per unit",
    "/oz",
    "/ounce",
    "/lb",
    "/unit",
    "/count",
];

const INSTALLMENT_CONTEXTS: &[&str] = &[
    "per month",
    "/mo",
    "monthly",
    "klarna",
    "affirm",
    "afterpay",
    "installment",
    "x4",
    "interest-free",
];

const LIST_PRICE_CONTEXTS: &[&str] = &[
    "list price",
    "was:",
    "strike",
    "a-text-price",
    "basisprice",
];

const SECONDARY_MARKET_CONTEXTS: &[&str] = &[
    "used",
    "refurbished",
    "renewed",
    "rental",
    "pre-owned",
    "other sellers",
    "more buying choices",
    "buying choices",
];

const PROMO_CONTEXTS: &[&str] = &[
    "off", "save", "coupon", "reward", "savings", "discount", "promo",
];

/// Pass B: scan the raw HTML with the fixed pattern table. Retailer-specific
/// price-widget patterns score highest; a bare `$NN.NN` text match scores
/// lowest and additionally rejects promotional-banner contexts.
#[must_use]
pub fn text_candidates(html: &str) -> Vec<PriceCandidate> {
    let mut out = Vec::new();

    for pattern in TEXT_PATTERNS.iter() {
        for cap in pattern.re.captures_iter(html) {
            let Some(m) = cap.get(1) else {
                continue;
            };
            let idx = m.start();
            if is_excluded_context(html, idx) {
                continue;
            }
            if pattern.check_promo && is_promo_context(html, idx) {
                continue;
            }
            if let Some(cents) = parse_money_str(m.as_str()) {
                if cents > 0 {
                    out.push(PriceCandidate {
                        cents,
                        score: pattern.score,
                        source: pattern.source,
                    });
                }
            }
        }
    }

    // Split-price widget: whole and fraction live in sibling spans.
    if let Some(whole) = PRICE_WHOLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .filter(|m| !is_excluded_context(html, m.start()))
    {
        let fraction = PRICE_FRACTION_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map_or("00", |m| m.as_str());
        if let Some(cents) = parse_money_str(&format!("{}.{fraction}", whole.as_str())) {
            if cents > 0 {
                out.push(PriceCandidate {
                    cents,
                    score: 55,
                    source: "amazon-price-parts",
                });
            }
        }
    }

    out
}

/// Lowercased text window around a match, clipped at UTF-8 boundaries via
/// lossy decoding so arbitrary byte offsets are safe.
fn context_window(html: &str, idx: usize, before: usize, after: usize) -> String {
    let bytes = html.as_bytes();
    let start = idx.saturating_sub(before);
    let end = (idx + after).min(bytes.len());
    String::from_utf8_lossy(&bytes[start..end]).to_lowercase()
}

/// Rejects matches whose surroundings mark them as something other than the
/// listing price: unit pricing, financing plans, struck-through list prices,
/// or secondary-market listings.
fn is_excluded_context(html: &str, idx: usize) -> bool {
    let window = context_window(html, idx, 40, 60);
    UNIT_CONTEXTS
        .iter()
        .chain(INSTALLMENT_CONTEXTS)
        .chain(LIST_PRICE_CONTEXTS)
        .chain(SECONDARY_MARKET_CONTEXTS)
        .any(|needle| window.contains(needle))
}

fn is_promo_context(html: &str, idx: usize) -> bool {
    let window = context_window(html, idx, 32, 32);
    PROMO_CONTEXTS.iter().any(|needle| window.contains(needle))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn offer_price_beats_node_price_and_captures_availability() {
        let nodes = vec![json!({
            "@type": "Product",
            "price": "59.99",
            "offers": {"price": "49.99", "availability": "http://schema.org/InStock"}
        })];
        let scan = structured_candidates(&nodes, Retailer::Amazon);

        let offer = scan
            .candidates
            .iter()
            .find(|c| c.source == "ld-offer-price")
            .unwrap();
        let node = scan
            .candidates
            .iter()
            .find(|c| c.source == "ld-node-price")
            .unwrap();
        assert_eq!(offer.cents, 4999);
        assert!(offer.score > node.score);
        assert_eq!(scan.availability.as_deref(), Some("http://schema.org/InStock"));
    }

    #[test]
    fn seller_match_boosts_first_party_offers() {
        let nodes = vec![json!({
            "offers": [
                {"price": "89.99", "seller": {"name": "SomeMarketplaceGuy"}},
                {"price": "79.99", "seller": {"name": "Amazon.com"}}
            ]
        })];
        let scan = structured_candidates(&nodes, Retailer::Amazon);
        let first_party = scan.candidates.iter().find(|c| c.cents == 7999).unwrap();
        let third_party = scan.candidates.iter().find(|c| c.cents == 8999).unwrap();
        assert_eq!(first_party.score, third_party.score + SELLER_MATCH_BOOST);
    }

    #[test]
    fn unit_price_specifications_are_skipped() {
        let nodes = vec![json!({
            "offers": {
                "priceSpecification": {
                    "@type": "UnitPriceSpecification",
                    "price": "1.25"
                }
            }
        })];
        let scan = structured_candidates(&nodes, Retailer::Amazon);
        assert!(scan.candidates.is_empty());

        // Unit detection also triggers on quantity fields without the type.
        let nodes = vec![json!({
            "priceSpecification": {"price": "1.25", "unitText": "oz"}
        })];
        assert!(structured_candidates(&nodes, Retailer::Amazon)
            .candidates
            .is_empty());
    }

    #[test]
    fn zero_and_negative_prices_are_dropped_at_the_source() {
        let nodes = vec![json!({"offers": {"price": "0"}}), json!({"price": 0})];
        assert!(structured_candidates(&nodes, Retailer::Amazon)
            .candidates
            .is_empty());
    }

    #[test]
    fn priceblock_widget_scores_above_generic_text() {
        let html = r#"
            <span id="priceblock_ourprice">$49.99</span>
            <div>Related items from $9.99</div>"#;
        let candidates = text_candidates(html);
        let widget = candidates
            .iter()
            .find(|c| c.source == "amazon-priceblock")
            .unwrap();
        let generic = candidates
            .iter()
            .find(|c| c.source == "dollar-text" && c.cents == 999)
            .unwrap();
        assert_eq!(widget.cents, 4999);
        assert!(widget.score > generic.score);
    }

    #[test]
    fn unit_priced_text_is_rejected() {
        let html = r#"<span>$12.99/oz</span>"#;
        assert!(text_candidates(html).is_empty());
    }

    #[test]
    fn installment_and_list_price_contexts_are_rejected() {
        let html = r#"<span>$20.00 per month with Klarna</span>"#;
        assert!(text_candidates(html).is_empty());

        let html = r#"<span>List Price: $129.99</span>"#;
        assert!(text_candidates(html).is_empty());

        let html = r#"<span class="a-price a-text-price"><span class="a-offscreen">$99.99</span></span>"#;
        assert!(text_candidates(html).is_empty());
    }

    #[test]
    fn secondary_market_contexts_are_rejected() {
        let html = r#"<div>Used from $34.20</div>"#;
        assert!(text_candidates(html).is_empty());
        let html = r#"<div>More Buying Choices $41.00</div>"#;
        assert!(text_candidates(html).is_empty());
    }

    #[test]
    fn promo_exclusion_applies_only_to_the_generic_pattern() {
        // "Save" next to a generic dollar amount: rejected.
        let html = r#"<div>Save $10.00 today</div>"#;
        assert!(text_candidates(html).is_empty());

        // The same word near a priceblock widget does not suppress it.
        let html = r#"<span id="priceblock_dealprice">$49.99</span> <b>Save big!</b>"#;
        let candidates = text_candidates(html);
        assert!(candidates.iter().any(|c| c.cents == 4999));
    }

    #[test]
    fn split_price_widget_is_assembled() {
        let html = r#"<span class="a-price-whole">1,299</span><span class="a-price-fraction">95</span>"#;
        let candidates = text_candidates(html);
        let parts = candidates
            .iter()
            .find(|c| c.source == "amazon-price-parts")
            .unwrap();
        assert_eq!(parts.cents, 129_995);
    }

    #[test]
    fn embedded_json_price_is_read() {
        let html = r#"<script>{"buyingOptions":{"price":"57.99"}}</script>"#;
        let candidates = text_candidates(html);
        assert!(candidates
            .iter()
            .any(|c| c.source == "embedded-json-price" && c.cents == 5799));
    }
}
