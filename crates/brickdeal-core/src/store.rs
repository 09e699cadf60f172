//! Persistence collaborator interface for the refresh pipeline.
//!
//! The scraper core never talks to a database directly; it is handed
//! something implementing [`PriceStore`]. Production uses the Postgres
//! implementation in `brickdeal-db`; tests use [`MemoryStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::records::{Offer, PricePoint, Retailer, SetRecord};

/// Backend-opaque persistence failure. Not swallowed by the pipeline: a
/// store error fails the item (or the single-item call) it occurred in.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(String);

impl StoreError {
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// One batch-refresh work item: a set plus the retailer URL to fetch for it.
#[derive(Debug, Clone)]
pub struct RefreshTarget {
    pub set_id: String,
    pub url: String,
}

/// Key-value style persistence keyed by `(set_id, retailer)`.
///
/// All operations are idempotent on repeated identical calls: upserts
/// insert-or-update, deletes of absent rows succeed, reassigns of zero rows
/// succeed.
#[allow(async_fn_in_trait)] // consumed generically, never as a trait object
pub trait PriceStore {
    async fn find_set(&self, set_id: &str) -> Result<Option<SetRecord>, StoreError>;

    /// Inserts the record or updates name/image/msrp in place.
    async fn upsert_set(&self, set: &SetRecord) -> Result<(), StoreError>;

    /// Unconditionally replaces the stored image URL. The
    /// only-upgrade-from-placeholder policy is enforced by the caller, which
    /// has already read the current record.
    async fn update_set_image(&self, set_id: &str, image_url: &str) -> Result<(), StoreError>;

    async fn find_offer(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<Offer>, StoreError>;

    async fn upsert_offer(&self, offer: &Offer) -> Result<(), StoreError>;

    async fn delete_offer(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError>;

    /// Most recent history entry for the pair, by `recorded_at`.
    async fn latest_history(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<PricePoint>, StoreError>;

    async fn append_history(&self, point: &PricePoint) -> Result<(), StoreError>;

    /// Moves all history rows for `(old_id, retailer)` under `new_id`,
    /// used when a synthetic id is remapped to a catalog id.
    async fn reassign_history(
        &self,
        old_id: &str,
        new_id: &str,
        retailer: Retailer,
    ) -> Result<(), StoreError>;

    /// Work items for a batch refresh: every set with a stored offer URL for
    /// `retailer`, ordered by set id. `take == 0` means no limit.
    async fn refresh_targets(
        &self,
        retailer: Retailer,
        take: usize,
    ) -> Result<Vec<RefreshTarget>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    sets: HashMap<String, SetRecord>,
    offers: HashMap<(String, Retailer), Offer>,
    history: Vec<PricePoint>,
}

/// In-memory [`PriceStore`] for tests and offline experiments. Not used in
/// production paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of history entries across all pairs, for test assertions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the inner mutex is poisoned.
    pub fn history_len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.history.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::backend("memory store mutex poisoned"))
    }
}

impl PriceStore for MemoryStore {
    async fn find_set(&self, set_id: &str) -> Result<Option<SetRecord>, StoreError> {
        Ok(self.lock()?.sets.get(set_id).cloned())
    }

    async fn upsert_set(&self, set: &SetRecord) -> Result<(), StoreError> {
        self.lock()?
            .sets
            .insert(set.set_id.clone(), set.clone());
        Ok(())
    }

    async fn update_set_image(&self, set_id: &str, image_url: &str) -> Result<(), StoreError> {
        if let Some(set) = self.lock()?.sets.get_mut(set_id) {
            set.image_url = image_url.to_owned();
        }
        Ok(())
    }

    async fn find_offer(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<Offer>, StoreError> {
        Ok(self
            .lock()?
            .offers
            .get(&(set_id.to_owned(), retailer))
            .cloned())
    }

    async fn upsert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        self.lock()?
            .offers
            .insert((offer.set_id.clone(), offer.retailer), offer.clone());
        Ok(())
    }

    async fn delete_offer(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError> {
        self.lock()?.offers.remove(&(set_id.to_owned(), retailer));
        Ok(())
    }

    async fn latest_history(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<PricePoint>, StoreError> {
        Ok(self
            .lock()?
            .history
            .iter()
            .filter(|p| p.set_id == set_id && p.retailer == retailer)
            .max_by_key(|p| p.recorded_at)
            .cloned())
    }

    async fn append_history(&self, point: &PricePoint) -> Result<(), StoreError> {
        self.lock()?.history.push(point.clone());
        Ok(())
    }

    async fn reassign_history(
        &self,
        old_id: &str,
        new_id: &str,
        retailer: Retailer,
    ) -> Result<(), StoreError> {
        for point in &mut self.lock()?.history {
            if point.set_id == old_id && point.retailer == retailer {
                point.set_id = new_id.to_owned();
            }
        }
        Ok(())
    }

    async fn refresh_targets(
        &self,
        retailer: Retailer,
        take: usize,
    ) -> Result<Vec<RefreshTarget>, StoreError> {
        let inner = self.lock()?;
        let mut set_ids: Vec<&String> = inner.sets.keys().collect();
        set_ids.sort();

        let mut targets = Vec::new();
        for set_id in set_ids {
            if take > 0 && targets.len() >= take {
                break;
            }
            if let Some(offer) = inner.offers.get(&(set_id.clone(), retailer)) {
                targets.push(RefreshTarget {
                    set_id: set_id.clone(),
                    url: offer.url.clone(),
                });
            }
        }
        Ok(targets)
    }
}
