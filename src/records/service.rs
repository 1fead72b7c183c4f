use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, warn};

use super::day::{DayWindow, LocalZone};
use crate::db::{
    self,
    models::{NewReading, RecordDetails},
    records::RecordFilter,
};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("You have already submitted a record on this date.")]
    DuplicateDay { recorded_at: DateTime<Utc> },
    #[error("record {0} not found")]
    NotFound(i32),
    #[error("unknown user or fridge")]
    UnknownReference,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A validated submission for a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub user_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub readings: Vec<NewReading>,
}

/// A validated replacement for an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub record_id: i32,
    pub user_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub readings: Vec<NewReading>,
}

/// Creates and edits records while keeping one record per user per local
/// calendar day.
#[derive(Clone)]
pub struct RecordService {
    pool: PgPool,
    zone: LocalZone,
}

impl RecordService {
    pub fn new(pool: PgPool, zone: LocalZone) -> Self {
        Self { pool, zone }
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    pub async fn list(&self, filter: RecordFilter) -> Result<Vec<RecordDetails>, RecordError> {
        Ok(db::records::list(&self.pool, filter).await?)
    }

    /// Inserts the record and all of its readings in one transaction.
    pub async fn create(&self, new: NewRecord) -> Result<RecordDetails, RecordError> {
        let window = self.zone.window(new.recorded_at);

        let id = match self.insert_record(&new, &window).await {
            Err(RecordError::Database(e)) if is_day_taken(&e) => {
                return Err(self.day_conflict(new.user_id, &window, None, e).await);
            }
            other => other?,
        };

        info!(
            record_id = id,
            user_id = new.user_id,
            recorded_at = %new.recorded_at,
            readings = new.readings.len(),
            "Record created"
        );
        self.load(id).await
    }

    /// Replaces the record's user, date and every reading in one transaction.
    pub async fn update(&self, update: RecordUpdate) -> Result<RecordDetails, RecordError> {
        let window = self.zone.window(update.recorded_at);

        match self.replace_record(&update, &window).await {
            Err(RecordError::Database(e)) if is_day_taken(&e) => {
                return Err(self
                    .day_conflict(update.user_id, &window, Some(update.record_id), e)
                    .await);
            }
            other => other?,
        }

        info!(
            record_id = update.record_id,
            user_id = update.user_id,
            recorded_at = %update.recorded_at,
            readings = update.readings.len(),
            "Record updated"
        );
        self.load(update.record_id).await
    }

    async fn insert_record(&self, new: &NewRecord, window: &DayWindow) -> Result<i32, RecordError> {
        let mut tx = self.pool.begin().await?;

        ensure_day_free(&mut tx, new.user_id, window, None).await?;

        let id = db::records::insert(&mut tx, new.user_id, new.recorded_at, window.day)
            .await
            .map_err(classify)?;
        db::records::insert_readings(&mut tx, id, &new.readings)
            .await
            .map_err(classify)?;

        tx.commit().await?;
        Ok(id)
    }

    async fn replace_record(
        &self,
        update: &RecordUpdate,
        window: &DayWindow,
    ) -> Result<(), RecordError> {
        let mut tx = self.pool.begin().await?;

        if !db::records::lock(&mut tx, update.record_id).await? {
            return Err(RecordError::NotFound(update.record_id));
        }
        ensure_day_free(&mut tx, update.user_id, window, Some(update.record_id)).await?;

        db::records::delete_readings(&mut tx, update.record_id).await?;
        db::records::update(
            &mut tx,
            update.record_id,
            update.user_id,
            update.recorded_at,
            window.day,
        )
        .await
        .map_err(classify)?;
        db::records::insert_readings(&mut tx, update.record_id, &update.readings)
            .await
            .map_err(classify)?;

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, id: i32) -> Result<RecordDetails, RecordError> {
        db::records::find(&self.pool, id)
            .await?
            .ok_or(RecordError::NotFound(id))
    }

    /// Builds the conflict reported when the storage constraint rejected a
    /// write that passed the in-transaction check.
    async fn day_conflict(
        &self,
        user_id: i32,
        window: &DayWindow,
        exclude: Option<i32>,
        cause: sqlx::Error,
    ) -> RecordError {
        let existing = match self.pool.acquire().await {
            Ok(mut conn) => {
                db::records::find_in_window(&mut conn, user_id, window.start, window.end, exclude)
                    .await
            }
            Err(e) => Err(e),
        };

        match existing {
            Ok(Some(recorded_at)) => {
                warn!(user_id, day = %window.day, "Concurrent submission for an occupied day");
                RecordError::DuplicateDay { recorded_at }
            }
            Ok(None) | Err(_) => RecordError::Database(cause),
        }
    }
}

async fn ensure_day_free(
    conn: &mut PgConnection,
    user_id: i32,
    window: &DayWindow,
    exclude: Option<i32>,
) -> Result<(), RecordError> {
    let existing =
        db::records::find_in_window(conn, user_id, window.start, window.end, exclude).await?;

    match existing {
        Some(recorded_at) => {
            warn!(user_id, day = %window.day, existing = %recorded_at, "Day already has a record");
            Err(RecordError::DuplicateDay { recorded_at })
        }
        None => Ok(()),
    }
}

fn classify(err: sqlx::Error) -> RecordError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_foreign_key_violation() => RecordError::UnknownReference,
        _ => RecordError::Database(err),
    }
}

fn is_day_taken(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| {
        db_err.is_unique_violation()
            && db_err.constraint() == Some(db::records::USER_DAY_CONSTRAINT)
    })
}
