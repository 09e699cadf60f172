//! Shared domain types, configuration, and persistence interfaces for the
//! brickdeal price tracker.

pub mod clicks;
pub mod config;
pub mod records;
pub mod store;

pub use clicks::{epc_cents, ClickCounter, MemoryClickCounter};
pub use config::{ConfigError, ScrapeConfig};
pub use records::{
    is_catalog_set_id, synthetic_set_id, Offer, PricePoint, RefreshResult, RefreshSummary,
    Retailer, SetRecord, PLACEHOLDER_IMAGE,
};
pub use store::{MemoryStore, PriceStore, RefreshTarget, StoreError};
