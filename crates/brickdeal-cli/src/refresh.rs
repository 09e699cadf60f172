//! Refresh command handlers, called from `main` after the pool is
//! established. Per-item failures are reported in the printed results, not
//! propagated; only store and client-construction errors abort a run.

use sqlx::PgPool;

use brickdeal_core::{RefreshResult, Retailer, ScrapeConfig};
use brickdeal_db::PgStore;
use brickdeal_scraper::{LegoCatalogLookup, Refresher};

fn build_refresher(pool: &PgPool) -> anyhow::Result<Refresher<PgStore, LegoCatalogLookup>> {
    let config = ScrapeConfig::from_env()?;
    let store = PgStore::new(pool.clone());
    // The catalog lookup shares request settings with the page client but
    // keeps its own reqwest::Client.
    let catalog_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?;
    let catalog = LegoCatalogLookup::new(catalog_client);
    Ok(Refresher::new(store, catalog, &config)?)
}

fn print_result(result: &RefreshResult) {
    let price = result
        .price_cents
        .map_or_else(|| "-".to_owned(), |c| format!("${}.{:02}", c / 100, c % 100));
    let stock = match result.in_stock {
        Some(true) => "in stock",
        Some(false) => "out of stock",
        None => "stock unknown",
    };
    if result.ok {
        println!("{}  {}  {}", result.set_id, price, stock);
    } else {
        println!(
            "{}  FAILED  {}",
            result.set_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// # Errors
///
/// Returns an error if the scraper cannot be constructed or a persistence
/// call fails mid-refresh.
pub(crate) async fn run_refresh_one(
    pool: &PgPool,
    retailer: Retailer,
    set_id: &str,
    url: Option<&str>,
) -> anyhow::Result<()> {
    let refresher = build_refresher(pool)?;
    let result = match url {
        Some(url) => refresher.refresh_one(retailer, set_id, url).await?,
        None => refresher.refresh_stored(retailer, set_id).await?,
    };
    print_result(&result);
    Ok(())
}

/// # Errors
///
/// Returns an error if the scraper cannot be constructed or a persistence
/// call fails mid-batch.
pub(crate) async fn run_refresh_all(
    pool: &PgPool,
    retailer: Retailer,
    concurrency: Option<usize>,
    take: usize,
) -> anyhow::Result<()> {
    let refresher = build_refresher(pool)?;
    let summary = refresher.refresh_all(retailer, concurrency, take).await?;

    for result in &summary.results {
        print_result(result);
    }
    println!(
        "{}: {} refreshed, {} failed of {}",
        retailer, summary.refreshed, summary.failed, summary.total
    );
    Ok(())
}
