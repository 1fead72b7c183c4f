use sqlx::PgPool;

use super::models::Fridge;

/// All fridges in storage order (by id).
pub async fn list(pool: &PgPool) -> Result<Vec<Fridge>, sqlx::Error> {
    sqlx::query_as::<_, Fridge>("SELECT id, name FROM fridges ORDER BY id")
        .fetch_all(pool)
        .await
}
