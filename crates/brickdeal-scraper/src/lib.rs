//! Price extraction and refresh pipeline for retailer product pages.
//!
//! Given a fetched Amazon or LEGO.com product page, the pipeline pulls
//! structured-data and raw-text price candidates, reconciles them against the
//! set's known list price, resolves the set's catalog identity, and merges
//! the result into the persistent store with change-triggered history.

pub mod candidates;
pub mod client;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod reconcile;
pub mod refresh;
mod retry;
pub mod structured;

pub use candidates::{structured_candidates, text_candidates, PriceCandidate, StructuredScan};
pub use client::{normalize_source_url, PageClient};
pub use error::ScrapeError;
pub use identity::{CatalogLookup, LegoCatalogLookup, NoCatalogLookup, SetIdentity};
pub use reconcile::{reconcile, resolve_in_stock, WinningPrice};
pub use refresh::Refresher;
pub use structured::extract_structured_blocks;
