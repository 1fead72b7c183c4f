//! Row builders shared by the database-backed tests.

use sqlx::PgPool;

pub async fn insert_user(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO users (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn insert_fridge(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO fridges (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}
