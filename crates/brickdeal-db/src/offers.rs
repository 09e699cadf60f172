//! Database operations for the `offers` table, keyed `(set_id, retailer)`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brickdeal_core::{Offer, RefreshTarget, Retailer};

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct OfferRow {
    set_id: String,
    retailer: String,
    url: String,
    price_cents: Option<i64>,
    in_stock: Option<bool>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = DbError;

    fn try_from(row: OfferRow) -> Result<Self, DbError> {
        let retailer: Retailer = row
            .retailer
            .parse()
            .map_err(DbError::InvalidRetailer)?;
        Ok(Offer {
            set_id: row.set_id,
            retailer,
            url: row.url,
            price_cents: row.price_cents,
            in_stock: row.in_stock,
            updated_at: row.updated_at,
        })
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidRetailer`] for a corrupt retailer value.
pub async fn find_offer(
    pool: &PgPool,
    set_id: &str,
    retailer: Retailer,
) -> Result<Option<Offer>, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(
        "SELECT set_id, retailer, url, price_cents, in_stock, updated_at \
         FROM offers WHERE set_id = $1 AND retailer = $2",
    )
    .bind(set_id)
    .bind(retailer.as_str())
    .fetch_optional(pool)
    .await?;
    row.map(Offer::try_from).transpose()
}

/// Upserts the single offer row for `(set_id, retailer)`. `updated_at` is
/// refreshed on every call, including no-op refreshes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_offer(pool: &PgPool, offer: &Offer) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO offers (set_id, retailer, url, price_cents, in_stock, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (set_id, retailer) DO UPDATE SET \
             url         = EXCLUDED.url, \
             price_cents = EXCLUDED.price_cents, \
             in_stock    = EXCLUDED.in_stock, \
             updated_at  = EXCLUDED.updated_at",
    )
    .bind(&offer.set_id)
    .bind(offer.retailer.as_str())
    .bind(&offer.url)
    .bind(offer.price_cents)
    .bind(offer.in_stock)
    .bind(offer.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes the offer row if present; deleting an absent row succeeds.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_offer(pool: &PgPool, set_id: &str, retailer: Retailer) -> Result<(), DbError> {
    sqlx::query("DELETE FROM offers WHERE set_id = $1 AND retailer = $2")
        .bind(set_id)
        .bind(retailer.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Batch-refresh work items: every set with a stored offer URL for the
/// retailer, ordered by set id. `take == 0` means no limit.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn refresh_targets(
    pool: &PgPool,
    retailer: Retailer,
    take: usize,
) -> Result<Vec<RefreshTarget>, DbError> {
    let limit = if take == 0 {
        i64::MAX
    } else {
        i64::try_from(take).unwrap_or(i64::MAX)
    };
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT s.set_id, o.url FROM sets s \
         JOIN offers o ON o.set_id = s.set_id AND o.retailer = $1 \
         ORDER BY s.set_id ASC LIMIT $2",
    )
    .bind(retailer.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(set_id, url)| RefreshTarget { set_id, url })
        .collect())
}
