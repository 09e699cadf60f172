//! Domain records shared by the scraper pipeline and the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image sentinel a set starts with until a real scraped image replaces it.
/// Images are only ever upgraded away from this value, never back to it.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-set.svg";

/// Prefix used for synthetic set ids minted before a catalog number is known
/// (typically Rakuten feed imports keyed by vendor SKU).
const SYNTHETIC_PREFIX: &str = "rk-";

/// A logical offer source. Stored as text in the database via [`Retailer::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Retailer {
    Amazon,
    Lego,
    Rakuten,
}

impl Retailer {
    /// Stable name used as the persistence key and in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Retailer::Amazon => "Amazon",
            Retailer::Lego => "LEGO",
            Retailer::Rakuten => "Rakuten",
        }
    }
}

impl std::fmt::Display for Retailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Retailer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Retailer::Amazon),
            "lego" => Ok(Retailer::Lego),
            "rakuten" => Ok(Retailer::Rakuten),
            other => Err(format!("unknown retailer: {other}")),
        }
    }
}

/// One tracked LEGO set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRecord {
    /// Catalog set number (e.g. `"75394"`) or a synthetic `rk-…` id minted
    /// before the catalog number was known.
    pub set_id: String,
    /// Best-known display name.
    pub name: Option<String>,
    /// Thumbnail URL; starts at [`PLACEHOLDER_IMAGE`].
    pub image_url: String,
    /// Manufacturer list price in cents. Used only as a plausibility anchor
    /// when scoring scraped candidates; scraped offers never overwrite it.
    pub msrp_cents: Option<i64>,
}

impl SetRecord {
    /// A fresh record carrying the placeholder image, the shape the
    /// orchestrator creates when it first learns about a set.
    #[must_use]
    pub fn placeholder(set_id: &str, name: Option<&str>) -> Self {
        Self {
            set_id: set_id.to_owned(),
            name: name
                .map(str::to_owned)
                .or_else(|| Some(format!("LEGO Set {set_id}"))),
            image_url: PLACEHOLDER_IMAGE.to_owned(),
            msrp_cents: None,
        }
    }
}

/// The current offer from one retailer for one set. At most one row per
/// `(set_id, retailer)`; writes are upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub set_id: String,
    pub retailer: Retailer,
    /// The URL the last refresh actually fetched (kept current, not the seed URL).
    pub url: String,
    pub price_cents: Option<i64>,
    /// `None` means availability could not be determined.
    pub in_stock: Option<bool>,
    /// Touched on every scrape attempt, including no-op refreshes.
    pub updated_at: DateTime<Utc>,
}

/// An append-only price/stock change entry. A new point is recorded only
/// when price or stock differs from the latest point for the same
/// `(set_id, retailer)`, so this is a change log, not a scrape log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub set_id: String,
    pub retailer: Retailer,
    pub price_cents: Option<i64>,
    pub in_stock: Option<bool>,
    pub recorded_at: DateTime<Utc>,
}

impl PricePoint {
    /// True when `other` carries the same price and stock state, i.e. a
    /// refresh that should not append a new history entry.
    #[must_use]
    pub fn same_state(&self, price_cents: Option<i64>, in_stock: Option<bool>) -> bool {
        self.price_cents == price_cents && self.in_stock == in_stock
    }
}

/// Outcome of refreshing a single set from one retailer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResult {
    pub set_id: String,
    pub ok: bool,
    /// The normalized URL that was (or would have been) fetched.
    pub source_url: Option<String>,
    pub price_cents: Option<i64>,
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    /// A per-item soft failure: the batch continues, the item reports why.
    #[must_use]
    pub fn failure(set_id: &str, source_url: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            set_id: set_id.to_owned(),
            ok: false,
            source_url: source_url.map(str::to_owned),
            price_cents: None,
            in_stock: None,
            error: Some(error.into()),
        }
    }
}

/// Summary of a batch refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub ok: bool,
    pub total: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub results: Vec<RefreshResult>,
}

impl RefreshSummary {
    /// Tallies per-item outcomes into a batch summary.
    #[must_use]
    pub fn from_results(results: Vec<RefreshResult>) -> Self {
        let refreshed = results.iter().filter(|r| r.ok).count();
        Self {
            ok: true,
            total: results.len(),
            refreshed,
            failed: results.len() - refreshed,
            results,
        }
    }
}

/// Mints a synthetic set id from a vendor token, used when an item enters the
/// catalog before its set number is known. Subject to later remap.
#[must_use]
pub fn synthetic_set_id(vendor_token: &str) -> String {
    format!("{SYNTHETIC_PREFIX}{}", vendor_token.trim())
}

/// True when `value` is a well-formed catalog set number: 4-6 digits, with
/// 4-digit tokens that read as calendar years (1900-2099) rejected.
#[must_use]
pub fn is_catalog_set_id(value: &str) -> bool {
    let v = value.trim();
    if !(4..=6).contains(&v.len()) || !v.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(n) = v.parse::<u32>() else {
        return false;
    };
    !(v.len() == 4 && (1900..=2099).contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_id_accepts_set_numbers() {
        assert!(is_catalog_set_id("75394"));
        assert!(is_catalog_set_id("8880"));
        assert!(is_catalog_set_id("910001"));
    }

    #[test]
    fn catalog_id_rejects_years_and_noise() {
        assert!(!is_catalog_set_id("2024"));
        assert!(!is_catalog_set_id("1999"));
        assert!(!is_catalog_set_id("123"));
        assert!(!is_catalog_set_id("1234567"));
        assert!(!is_catalog_set_id("rk-12345"));
        assert!(!is_catalog_set_id("75a94"));
    }

    #[test]
    fn synthetic_ids_are_not_catalog_ids() {
        let id = synthetic_set_id("B0ABC123");
        assert_eq!(id, "rk-B0ABC123");
        assert!(!is_catalog_set_id(&id));
    }

    #[test]
    fn retailer_round_trips_through_str() {
        for r in [Retailer::Amazon, Retailer::Lego, Retailer::Rakuten] {
            assert_eq!(r.as_str().parse::<Retailer>().unwrap(), r);
        }
        assert!("target".parse::<Retailer>().is_err());
    }

    #[test]
    fn same_state_compares_price_and_stock() {
        let point = PricePoint {
            set_id: "75394".to_owned(),
            retailer: Retailer::Amazon,
            price_cents: Some(1000),
            in_stock: Some(true),
            recorded_at: Utc::now(),
        };
        assert!(point.same_state(Some(1000), Some(true)));
        assert!(!point.same_state(Some(900), Some(true)));
        assert!(!point.same_state(Some(1000), Some(false)));
        assert!(!point.same_state(Some(1000), None));
    }
}
