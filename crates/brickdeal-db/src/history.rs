//! Database operations for the append-only `price_history` change log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brickdeal_core::{PricePoint, Retailer};

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct HistoryRow {
    set_id: String,
    retailer: String,
    price_cents: Option<i64>,
    in_stock: Option<bool>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for PricePoint {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, DbError> {
        let retailer: Retailer = row
            .retailer
            .parse()
            .map_err(DbError::InvalidRetailer)?;
        Ok(PricePoint {
            set_id: row.set_id,
            retailer,
            price_cents: row.price_cents,
            in_stock: row.in_stock,
            recorded_at: row.recorded_at,
        })
    }
}

/// Most recent entry for the pair, by `recorded_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidRetailer`] for a corrupt retailer value.
pub async fn latest_history(
    pool: &PgPool,
    set_id: &str,
    retailer: Retailer,
) -> Result<Option<PricePoint>, DbError> {
    let row = sqlx::query_as::<_, HistoryRow>(
        "SELECT set_id, retailer, price_cents, in_stock, recorded_at \
         FROM price_history WHERE set_id = $1 AND retailer = $2 \
         ORDER BY recorded_at DESC LIMIT 1",
    )
    .bind(set_id)
    .bind(retailer.as_str())
    .fetch_optional(pool)
    .await?;
    row.map(PricePoint::try_from).transpose()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_history(pool: &PgPool, point: &PricePoint) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO price_history (set_id, retailer, price_cents, in_stock, recorded_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&point.set_id)
    .bind(point.retailer.as_str())
    .bind(point.price_cents)
    .bind(point.in_stock)
    .bind(point.recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Moves all history rows for `(old_id, retailer)` under `new_id`. Zero
/// matching rows is a successful no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reassign_history(
    pool: &PgPool,
    old_id: &str,
    new_id: &str,
    retailer: Retailer,
) -> Result<(), DbError> {
    sqlx::query("UPDATE price_history SET set_id = $2 WHERE set_id = $1 AND retailer = $3")
        .bind(old_id)
        .bind(new_id)
        .bind(retailer.as_str())
        .execute(pool)
        .await?;
    Ok(())
}
