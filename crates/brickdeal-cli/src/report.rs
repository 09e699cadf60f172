//! `epc` command: earnings-per-click report over clicks and conversions.

use sqlx::PgPool;

/// # Errors
///
/// Returns an error if the report query fails.
pub(crate) async fn run_epc(pool: &PgPool) -> anyhow::Result<()> {
    let report = brickdeal_db::clicks::epc_report(pool).await?;
    if report.is_empty() {
        println!("no conversions recorded");
        return Ok(());
    }

    println!("{:<12} {:<8} {:>8} {:>12} {:>8}", "set", "retailer", "clicks", "commission", "epc");
    for row in &report {
        let epc = row
            .epc_cents
            .map_or_else(|| "-".to_owned(), |c| format!("{}.{:02}", c / 100, c % 100));
        println!(
            "{:<12} {:<8} {:>8} {:>9}.{:02} {:>8}",
            row.set_id,
            row.retailer.as_str(),
            row.clicks,
            row.commission_cents / 100,
            row.commission_cents % 100,
            epc
        );
    }
    Ok(())
}
