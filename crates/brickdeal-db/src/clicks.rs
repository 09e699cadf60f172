//! Affiliate click tracking and the EPC (earnings-per-click) report.

use brickdeal_core::{epc_cents, Retailer};
use sqlx::PgPool;

use crate::DbError;

/// One row of the EPC report: commission revenue and click volume for a
/// `(set, retailer)` pair. `epc_cents` is `None` when the pair has revenue
/// but no recorded clicks.
#[derive(Debug, Clone)]
pub struct EpcRow {
    pub set_id: String,
    pub retailer: Retailer,
    pub clicks: u64,
    pub commission_cents: i64,
    pub epc_cents: Option<i64>,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_click(pool: &PgPool, set_id: &str, retailer: Retailer) -> Result<(), DbError> {
    sqlx::query("INSERT INTO outbound_clicks (set_id, retailer) VALUES ($1, $2)")
        .bind(set_id)
        .bind(retailer.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn click_count(pool: &PgPool, set_id: &str, retailer: Retailer) -> Result<u64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM outbound_clicks WHERE set_id = $1 AND retailer = $2",
    )
    .bind(set_id)
    .bind(retailer.as_str())
    .fetch_one(pool)
    .await?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Commission and click totals per `(set, retailer)` pair, highest revenue
/// first. Pairs with conversions but no clicks still appear, with an
/// undefined EPC.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidRetailer`] for a corrupt retailer value.
pub async fn epc_report(pool: &PgPool) -> Result<Vec<EpcRow>, DbError> {
    let rows: Vec<(Option<String>, String, i64, i64)> = sqlx::query_as(
        "SELECT c.set_id, c.retailer, \
                COALESCE(SUM(c.commission_cents), 0)::BIGINT AS commission_cents, \
                COALESCE(( \
                    SELECT COUNT(*) FROM outbound_clicks o \
                    WHERE o.set_id = c.set_id AND o.retailer = c.retailer \
                ), 0) AS clicks \
         FROM conversions c \
         GROUP BY c.set_id, c.retailer \
         ORDER BY commission_cents DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut report = Vec::with_capacity(rows.len());
    for (set_id, retailer, commission_cents, clicks) in rows {
        let retailer: Retailer = retailer.parse().map_err(DbError::InvalidRetailer)?;
        let clicks = u64::try_from(clicks).unwrap_or(0);
        report.push(EpcRow {
            set_id: set_id.unwrap_or_else(|| "(unattributed)".to_owned()),
            retailer,
            clicks,
            commission_cents,
            epc_cents: epc_cents(commission_cents, clicks),
        });
    }
    Ok(report)
}
