//! Queries and mutations over `records` and their `fridge_temperatures`.
//!
//! Mutating functions take a `&mut PgConnection` so that callers can run
//! them inside a transaction (`&mut *tx`).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use super::models::{
    NewReading, ReadingDetails, ReadingRow, RecordDetails, RecordRow, User,
};

/// Name of the `UNIQUE (user_id, recorded_on)` constraint.
pub const USER_DAY_CONSTRAINT: &str = "records_user_day_key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub user_id: Option<i32>,
    pub limit: Option<i64>,
}

/// Records matching `filter`, newest first, fully expanded.
pub async fn list(pool: &PgPool, filter: RecordFilter) -> Result<Vec<RecordDetails>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT r.id,
               r.user_id,
               u.name AS user_name,
               r.recorded_at
        FROM records r
        JOIN users u ON u.id = r.user_id
        WHERE ($1::int4 IS NULL OR r.user_id = $1)
        ORDER BY r.recorded_at DESC, r.id DESC
        LIMIT $2
        "#,
    )
    .bind(filter.user_id)
    .bind(filter.limit)
    .fetch_all(pool)
    .await?;

    attach_readings(pool, rows).await
}

/// A single record, fully expanded.
pub async fn find(pool: &PgPool, id: i32) -> Result<Option<RecordDetails>, sqlx::Error> {
    let row = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT r.id,
               r.user_id,
               u.name AS user_name,
               r.recorded_at
        FROM records r
        JOIN users u ON u.id = r.user_id
        WHERE r.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(attach_readings(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn attach_readings(
    pool: &PgPool,
    rows: Vec<RecordRow>,
) -> Result<Vec<RecordDetails>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let readings = sqlx::query_as::<_, ReadingRow>(
        r#"
        SELECT t.id,
               t.record_id,
               f.id   AS fridge_id,
               f.name AS fridge_name,
               t.temperature
        FROM fridge_temperatures t
        JOIN fridges f ON f.id = t.fridge_id
        WHERE t.record_id = ANY($1)
        ORDER BY t.record_id, t.id
        "#,
    )
    .bind(ids.as_slice())
    .fetch_all(pool)
    .await?;

    let mut by_record: HashMap<i32, Vec<ReadingDetails>> = HashMap::new();
    for reading in readings {
        by_record
            .entry(reading.record_id)
            .or_default()
            .push(reading.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| RecordDetails {
            id: row.id,
            readings: by_record.remove(&row.id).unwrap_or_default(),
            user: User {
                id: row.user_id,
                name: row.user_name,
            },
            recorded_at: row.recorded_at,
        })
        .collect())
}

/// `recorded_at` of a record of `user_id` within `[start, end)`, ignoring
/// the record `exclude` if given.
pub async fn find_in_window(
    conn: &mut PgConnection,
    user_id: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<i32>,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT recorded_at
        FROM records
        WHERE user_id = $1
          AND recorded_at >= $2
          AND recorded_at <  $3
          AND ($4::int4 IS NULL OR id <> $4)
        ORDER BY recorded_at
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .bind(exclude)
    .fetch_optional(conn)
    .await
}

/// Takes a row lock on the record. Returns `false` when it does not exist.
pub async fn lock(conn: &mut PgConnection, id: i32) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar("SELECT id FROM records WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

pub async fn insert(
    conn: &mut PgConnection,
    user_id: i32,
    recorded_at: DateTime<Utc>,
    recorded_on: NaiveDate,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO records (user_id, recorded_at, recorded_on)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(recorded_at)
    .bind(recorded_on)
    .fetch_one(conn)
    .await
}

pub async fn update(
    conn: &mut PgConnection,
    id: i32,
    user_id: i32,
    recorded_at: DateTime<Utc>,
    recorded_on: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE records
        SET user_id = $2, recorded_at = $3, recorded_on = $4
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(recorded_at)
    .bind(recorded_on)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_readings(conn: &mut PgConnection, record_id: i32) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM fridge_temperatures WHERE record_id = $1")
        .bind(record_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Inserts `readings` in order, in a single statement.
pub async fn insert_readings(
    conn: &mut PgConnection,
    record_id: i32,
    readings: &[NewReading],
) -> Result<u64, sqlx::Error> {
    let fridge_ids: Vec<i32> = readings.iter().map(|r| r.fridge_id).collect();
    let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO fridge_temperatures (record_id, fridge_id, temperature)
        SELECT $1, t.fridge_id, t.temperature
        FROM UNNEST($2::int4[], $3::float8[]) WITH ORDINALITY AS t(fridge_id, temperature, n)
        ORDER BY t.n
        "#,
    )
    .bind(record_id)
    .bind(fridge_ids.as_slice())
    .bind(temperatures.as_slice())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
