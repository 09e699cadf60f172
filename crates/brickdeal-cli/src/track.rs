//! `track` command: register a set and a retailer URL for future refreshes.

use chrono::Utc;
use sqlx::PgPool;

use brickdeal_core::{is_catalog_set_id, synthetic_set_id, Offer, Retailer, SetRecord};

/// Registers a set (minting a synthetic id when the token is not a catalog
/// set number) and stores the retailer URL as its offer, with no price until
/// the first refresh.
///
/// # Errors
///
/// Returns an error if either upsert fails.
pub(crate) async fn run_track(
    pool: &PgPool,
    retailer: Retailer,
    set_id: &str,
    url: &str,
    name: Option<&str>,
    msrp_cents: Option<i64>,
) -> anyhow::Result<()> {
    let set_id = if is_catalog_set_id(set_id) {
        set_id.to_owned()
    } else {
        let synthetic = synthetic_set_id(set_id);
        tracing::info!(token = set_id, synthetic = %synthetic, "minted synthetic set id");
        synthetic
    };

    let mut set = match brickdeal_db::sets::find_set(pool, &set_id).await? {
        Some(existing) => existing,
        None => SetRecord::placeholder(&set_id, name),
    };
    if let Some(name) = name {
        set.name = Some(name.to_owned());
    }
    if msrp_cents.is_some() {
        set.msrp_cents = msrp_cents;
    }
    brickdeal_db::sets::upsert_set(pool, &set).await?;

    let price_cents = brickdeal_db::offers::find_offer(pool, &set_id, retailer)
        .await?
        .and_then(|o| o.price_cents);
    brickdeal_db::offers::upsert_offer(
        pool,
        &Offer {
            set_id: set_id.clone(),
            retailer,
            url: url.to_owned(),
            price_cents,
            in_stock: None,
            updated_at: Utc::now(),
        },
    )
    .await?;

    println!("tracking {set_id} on {retailer}: {url}");
    Ok(())
}
