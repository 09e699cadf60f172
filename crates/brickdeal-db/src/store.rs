//! Postgres-backed implementations of the core persistence interfaces.

use sqlx::PgPool;

use brickdeal_core::{
    ClickCounter, Offer, PricePoint, PriceStore, RefreshTarget, Retailer, SetRecord, StoreError,
};

use crate::{clicks, history, offers, sets, DbError};

/// [`PriceStore`] and [`ClickCounter`] over a shared connection pool.
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(err: DbError) -> StoreError {
    StoreError::backend(err.to_string())
}

impl PriceStore for PgStore {
    async fn find_set(&self, set_id: &str) -> Result<Option<SetRecord>, StoreError> {
        sets::find_set(&self.pool, set_id).await.map_err(store_err)
    }

    async fn upsert_set(&self, set: &SetRecord) -> Result<(), StoreError> {
        sets::upsert_set(&self.pool, set).await.map_err(store_err)
    }

    async fn update_set_image(&self, set_id: &str, image_url: &str) -> Result<(), StoreError> {
        sets::update_set_image(&self.pool, set_id, image_url)
            .await
            .map_err(store_err)
    }

    async fn find_offer(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<Offer>, StoreError> {
        offers::find_offer(&self.pool, set_id, retailer)
            .await
            .map_err(store_err)
    }

    async fn upsert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        offers::upsert_offer(&self.pool, offer)
            .await
            .map_err(store_err)
    }

    async fn delete_offer(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError> {
        offers::delete_offer(&self.pool, set_id, retailer)
            .await
            .map_err(store_err)
    }

    async fn latest_history(
        &self,
        set_id: &str,
        retailer: Retailer,
    ) -> Result<Option<PricePoint>, StoreError> {
        history::latest_history(&self.pool, set_id, retailer)
            .await
            .map_err(store_err)
    }

    async fn append_history(&self, point: &PricePoint) -> Result<(), StoreError> {
        history::append_history(&self.pool, point)
            .await
            .map_err(store_err)
    }

    async fn reassign_history(
        &self,
        old_id: &str,
        new_id: &str,
        retailer: Retailer,
    ) -> Result<(), StoreError> {
        history::reassign_history(&self.pool, old_id, new_id, retailer)
            .await
            .map_err(store_err)
    }

    async fn refresh_targets(
        &self,
        retailer: Retailer,
        take: usize,
    ) -> Result<Vec<RefreshTarget>, StoreError> {
        offers::refresh_targets(&self.pool, retailer, take)
            .await
            .map_err(store_err)
    }
}

impl ClickCounter for PgStore {
    async fn record_click(&self, set_id: &str, retailer: Retailer) -> Result<(), StoreError> {
        clicks::record_click(&self.pool, set_id, retailer)
            .await
            .map_err(store_err)
    }

    async fn click_count(&self, set_id: &str, retailer: Retailer) -> Result<u64, StoreError> {
        clicks::click_count(&self.pool, set_id, retailer)
            .await
            .map_err(store_err)
    }
}
