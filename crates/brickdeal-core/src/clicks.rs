//! Outbound-click counting and EPC (earnings-per-click) math.
//!
//! Click totals feed the admin EPC report: commission revenue divided by
//! outbound clicks per `(set, retailer)`. The counter is an injected
//! interface rather than process-global state so production can back it
//! with the database while tests use an in-memory map.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::records::Retailer;
use crate::store::StoreError;

/// Counter for outbound affiliate clicks.
#[allow(async_fn_in_trait)] // consumed generically, never as a trait object
pub trait ClickCounter {
    async fn record_click(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError>;

    async fn click_count(&self, set_id: &str, retailer: Retailer) -> Result<u64, StoreError>;
}

/// Earnings per click in cents, rounded to the nearest cent.
/// `None` when there are no clicks to divide by.
#[must_use]
pub fn epc_cents(commission_cents: i64, clicks: u64) -> Option<i64> {
    if clicks == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)] // commission totals are far below 2^52
    let epc = commission_cents as f64 / clicks as f64;
    Some(epc.round() as i64)
}

/// In-memory [`ClickCounter`] for tests.
#[derive(Debug, Default)]
pub struct MemoryClickCounter {
    counts: Mutex<HashMap<(String, Retailer), u64>>,
}

impl MemoryClickCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClickCounter for MemoryClickCounter {
    async fn record_click(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError> {
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| StoreError::backend("click counter mutex poisoned"))?;
        *counts.entry((set_id.to_owned(), retailer)).or_insert(0) += 1;
        Ok(())
    }

    async fn click_count(&self, set_id: &str, retailer: Retailer) -> Result<u64, StoreError> {
        let counts = self
            .counts
            .lock()
            .map_err(|_| StoreError::backend("click counter mutex poisoned"))?;
        Ok(counts
            .get(&(set_id.to_owned(), retailer))
            .copied()
            .unwrap_or(0))
    }
}
