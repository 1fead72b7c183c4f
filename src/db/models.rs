use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Fridge {
    pub id: i32,
    pub name: String,
}

/// A `records` row joined with the name of its owning user.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub recorded_at: DateTime<Utc>,
}

/// A `fridge_temperatures` row joined with the name of its fridge.
#[derive(Debug, Clone, FromRow)]
pub struct ReadingRow {
    pub id: i32,
    pub record_id: i32,
    pub fridge_id: i32,
    pub fridge_name: String,
    /// Degrees Celsius
    pub temperature: f64,
}

/// A record expanded with its user and its readings, each reading carrying
/// the fridge it was taken from.
#[derive(Debug, Clone)]
pub struct RecordDetails {
    pub id: i32,
    pub user: User,
    pub recorded_at: DateTime<Utc>,
    pub readings: Vec<ReadingDetails>,
}

#[derive(Debug, Clone)]
pub struct ReadingDetails {
    pub id: i32,
    pub record_id: i32,
    pub fridge: Fridge,
    /// Degrees Celsius
    pub temperature: f64,
}

impl From<ReadingRow> for ReadingDetails {
    fn from(r: ReadingRow) -> Self {
        Self {
            id: r.id,
            record_id: r.record_id,
            fridge: Fridge {
                id: r.fridge_id,
                name: r.fridge_name,
            },
            temperature: r.temperature,
        }
    }
}

/// One reading to be written for a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub fridge_id: i32,
    /// Degrees Celsius
    pub temperature: f64,
}
