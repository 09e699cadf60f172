//! Database operations for the `sets` table.

use brickdeal_core::SetRecord;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct SetRow {
    set_id: String,
    name: Option<String>,
    image_url: String,
    msrp_cents: Option<i64>,
}

impl From<SetRow> for SetRecord {
    fn from(row: SetRow) -> Self {
        SetRecord {
            set_id: row.set_id,
            name: row.name,
            image_url: row.image_url,
            msrp_cents: row.msrp_cents,
        }
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_set(pool: &PgPool, set_id: &str) -> Result<Option<SetRecord>, DbError> {
    let row = sqlx::query_as::<_, SetRow>(
        "SELECT set_id, name, image_url, msrp_cents FROM sets WHERE set_id = $1",
    )
    .bind(set_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(SetRecord::from))
}

/// Upserts a set record. Conflicts on `set_id` update name, image, and MSRP
/// in place.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_set(pool: &PgPool, set: &SetRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sets (set_id, name, image_url, msrp_cents) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (set_id) DO UPDATE SET \
             name       = EXCLUDED.name, \
             image_url  = EXCLUDED.image_url, \
             msrp_cents = EXCLUDED.msrp_cents, \
             updated_at = NOW()",
    )
    .bind(&set.set_id)
    .bind(&set.name)
    .bind(&set.image_url)
    .bind(set.msrp_cents)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replaces only the image URL. The placeholder-upgrade policy is enforced
/// by the orchestrator, which reads the record first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_set_image(pool: &PgPool, set_id: &str, image_url: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE sets SET image_url = $2, updated_at = NOW() WHERE set_id = $1")
        .bind(set_id)
        .bind(image_url)
        .execute(pool)
        .await?;
    Ok(())
}
