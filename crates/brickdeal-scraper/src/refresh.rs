//! The refresh orchestrator: fetch, parse, reconcile, remap, persist.
//!
//! Single-item flow per scrape attempt:
//! fetch → identity/remap → image upgrade → candidate scan → reconcile →
//! offer upsert → change-triggered history append. Batch mode runs the same
//! flow over store-provided targets with bounded concurrency.

use chrono::Utc;
use futures::{stream, StreamExt};

use brickdeal_core::config::MAX_CONCURRENCY;
use brickdeal_core::{
    is_catalog_set_id, Offer, PricePoint, PriceStore, RefreshResult, RefreshSummary, Retailer,
    ScrapeConfig, SetRecord, StoreError, PLACEHOLDER_IMAGE,
};

use crate::candidates::{structured_candidates, text_candidates};
use crate::client::{normalize_source_url, PageClient};
use crate::error::ScrapeError;
use crate::identity::{extract_image_url, resolve_identity, CatalogLookup};
use crate::reconcile::{reconcile, resolve_in_stock};
use crate::structured::extract_structured_blocks;

/// Runs refreshes against a [`PriceStore`] and an external [`CatalogLookup`].
pub struct Refresher<S, C> {
    store: S,
    catalog: C,
    client: PageClient,
    default_concurrency: usize,
}

impl<S: PriceStore, C: CatalogLookup> Refresher<S, C> {
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the HTTP client cannot be built.
    pub fn new(store: S, catalog: C, config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            store,
            catalog,
            client: PageClient::new(config)?,
            default_concurrency: config.concurrency,
        })
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Refreshes one set from one retailer page.
    ///
    /// Input and fetch problems come back as a soft failure result so batch
    /// callers can report them per item.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Store`] when a persistence call fails; store
    /// errors are never folded into the result.
    pub async fn refresh_one(
        &self,
        retailer: Retailer,
        set_id: &str,
        source_url: &str,
    ) -> Result<RefreshResult, ScrapeError> {
        tracing::info!(set_id, retailer = %retailer, "refresh start");

        let fetch_url = match normalize_source_url(source_url, retailer) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(set_id, error = %err, "refresh skipped: bad source URL");
                return Ok(RefreshResult::failure(set_id, Some(source_url), err.to_string()));
            }
        };

        let html = match self.client.fetch_html(&fetch_url).await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(set_id, error = %err, "refresh fetch failed");
                return Ok(RefreshResult::failure(set_id, Some(&fetch_url), err.to_string()));
            }
        };

        let nodes = extract_structured_blocks(&html);

        // Identity resolution only applies to Amazon-style pages, where the
        // tracked id may be a synthetic feed id rather than a catalog number.
        let mut effective_id = set_id.to_owned();
        let mut resolved_name = None;
        if retailer == Retailer::Amazon {
            let identity = resolve_identity(&html, &nodes, &self.catalog).await;
            if !is_catalog_set_id(set_id) {
                if let Some(new_id) = identity.set_id.as_deref() {
                    if new_id != set_id && is_catalog_set_id(new_id) {
                        self.remap(set_id, new_id, identity.name.as_deref(), retailer)
                            .await?;
                        effective_id = new_id.to_owned();
                    }
                }
            }
            resolved_name = identity.name;
        }

        let set = match self.store.find_set(&effective_id).await? {
            Some(set) => set,
            None => {
                let record = SetRecord::placeholder(&effective_id, resolved_name.as_deref());
                self.store.upsert_set(&record).await?;
                record
            }
        };

        if retailer == Retailer::Amazon && is_placeholder_image(&set.image_url) {
            if let Some(image_url) = extract_image_url(&html, &nodes) {
                self.store.update_set_image(&effective_id, &image_url).await?;
            }
        }

        let scan = structured_candidates(&nodes, retailer);
        let mut pool = scan.candidates;
        pool.extend(text_candidates(&html));
        let winner = reconcile(&pool, set.msrp_cents);
        let price_cents = winner.map(|w| w.cents);
        let in_stock = resolve_in_stock(scan.availability.as_deref(), &html, price_cents.is_some());

        tracing::info!(
            set_id = %effective_id,
            price_cents,
            in_stock,
            source = winner.map(|w| w.source),
            "refresh parsed"
        );

        self.store
            .upsert_offer(&Offer {
                set_id: effective_id.clone(),
                retailer,
                url: fetch_url.clone(),
                price_cents,
                in_stock,
                updated_at: Utc::now(),
            })
            .await?;

        let changed = match self.store.latest_history(&effective_id, retailer).await? {
            Some(last) => !last.same_state(price_cents, in_stock),
            None => true,
        };
        if changed {
            self.store
                .append_history(&PricePoint {
                    set_id: effective_id.clone(),
                    retailer,
                    price_cents,
                    in_stock,
                    recorded_at: Utc::now(),
                })
                .await?;
        }

        tracing::info!(set_id = %effective_id, changed, "refresh done");
        Ok(RefreshResult {
            set_id: effective_id,
            ok: true,
            source_url: Some(fetch_url),
            price_cents,
            in_stock,
            error: None,
        })
    }

    /// Refreshes a set from its stored offer URL for the retailer.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Store`] when a persistence call fails.
    pub async fn refresh_stored(
        &self,
        retailer: Retailer,
        set_id: &str,
    ) -> Result<RefreshResult, ScrapeError> {
        match self.store.find_offer(set_id, retailer).await? {
            Some(offer) => self.refresh_one(retailer, set_id, &offer.url).await,
            None => Ok(RefreshResult::failure(
                set_id,
                None,
                format!("no stored {retailer} URL for this set"),
            )),
        }
    }

    /// Refreshes every set with a stored offer URL for `retailer`.
    ///
    /// Work items run through a bounded buffer of `concurrency` in-flight
    /// refreshes (clamped to 1..=10, defaulting to the configured value);
    /// each item runs its own pipeline to completion before its slot is
    /// reused. One item's failure never aborts its siblings.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Store`] only if the initial target listing
    /// fails; per-item store errors are reported in that item's result.
    pub async fn refresh_all(
        &self,
        retailer: Retailer,
        concurrency: Option<usize>,
        take: usize,
    ) -> Result<RefreshSummary, ScrapeError> {
        let targets = self.store.refresh_targets(retailer, take).await?;
        let workers = concurrency
            .unwrap_or(self.default_concurrency)
            .clamp(1, MAX_CONCURRENCY);

        tracing::info!(retailer = %retailer, total = targets.len(), workers, "batch refresh start");

        let results: Vec<RefreshResult> = stream::iter(targets)
            .map(|target| async move {
                match self
                    .refresh_one(retailer, &target.set_id, &target.url)
                    .await
                {
                    Ok(result) => result,
                    Err(err) => {
                        RefreshResult::failure(&target.set_id, Some(&target.url), err.to_string())
                    }
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let summary = RefreshSummary::from_results(results);
        tracing::info!(
            retailer = %retailer,
            total = summary.total,
            refreshed = summary.refreshed,
            failed = summary.failed,
            "batch refresh done"
        );
        Ok(summary)
    }

    /// Remaps a synthetic id onto a freshly-resolved catalog id: the target
    /// record is ensured, the stale offer row dropped, and history moved, so
    /// subsequent writes all land under the catalog id.
    async fn remap(
        &self,
        old_id: &str,
        new_id: &str,
        name: Option<&str>,
        retailer: Retailer,
    ) -> Result<(), StoreError> {
        tracing::info!(old_id, new_id, retailer = %retailer, "remapping synthetic set id");
        if self.store.find_set(new_id).await?.is_none() {
            self.store
                .upsert_set(&SetRecord::placeholder(new_id, name))
                .await?;
        }
        self.store.delete_offer(old_id, retailer).await?;
        self.store.reassign_history(old_id, new_id, retailer).await?;
        Ok(())
    }
}

fn is_placeholder_image(current: &str) -> bool {
    let current = current.trim();
    current.is_empty() || current == PLACEHOLDER_IMAGE
}
