use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::AppError;
use crate::db::models::{Fridge, NewReading, ReadingDetails, RecordDetails, User};
use crate::records::{parse_recorded_at, LocalZone, NewRecord, RecordUpdate};

pub const INVALID_CREATE: &str = "Invalid input";
pub const INVALID_UPDATE: &str = "Invalid input. Missing required fields.";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FridgeDto {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    pub id: i32,
    pub record_id: i32,
    pub fridge_id: i32,
    /// Degrees Celsius
    pub temperature: f64,
    pub fridge: FridgeDto,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordDto {
    pub id: i32,
    pub user_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub user: UserDto,
    /// Ordered as submitted.
    pub readings: Vec<ReadingDto>,
}

/// Response body for `POST /records`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecordDto {
    pub new_record: RecordDto,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDto {
    pub error: String,
}

/// Body of a `409 Conflict`: the day is already covered by another record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDayDto {
    pub error: String,
    /// `recordedAt` of the record already occupying the day.
    pub recorded_at: DateTime<Utc>,
}

/// One entry of `fridgeTemperatures`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FridgeTemperatureInput {
    pub fridge_id: Option<i32>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
}

/// Request body for `POST /records`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub user_id: Option<i32>,
    /// RFC 3339 timestamp, local date-time or `YYYY-MM-DD`.
    pub recorded_at: Option<String>,
    pub fridge_temperatures: Option<Vec<FridgeTemperatureInput>>,
}

/// Request body for `PUT /records`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    pub record_id: Option<i32>,
    pub user_id: Option<i32>,
    /// RFC 3339 timestamp, local date-time or `YYYY-MM-DD`.
    pub recorded_at: Option<String>,
    pub fridge_temperatures: Option<Vec<FridgeTemperatureInput>>,
}

impl CreateRecordRequest {
    pub fn validate(self, zone: LocalZone) -> Result<NewRecord, AppError> {
        let invalid = || AppError::InvalidInput(INVALID_CREATE);
        Ok(NewRecord {
            user_id: self.user_id.ok_or_else(invalid)?,
            recorded_at: recorded_at(self.recorded_at.as_deref(), zone).ok_or_else(invalid)?,
            readings: readings(self.fridge_temperatures).ok_or_else(invalid)?,
        })
    }
}

impl UpdateRecordRequest {
    pub fn validate(self, zone: LocalZone) -> Result<RecordUpdate, AppError> {
        let invalid = || AppError::InvalidInput(INVALID_UPDATE);
        Ok(RecordUpdate {
            record_id: self.record_id.ok_or_else(invalid)?,
            user_id: self.user_id.ok_or_else(invalid)?,
            recorded_at: recorded_at(self.recorded_at.as_deref(), zone).ok_or_else(invalid)?,
            readings: readings(self.fridge_temperatures).ok_or_else(invalid)?,
        })
    }
}

fn recorded_at(raw: Option<&str>, zone: LocalZone) -> Option<DateTime<Utc>> {
    parse_recorded_at(raw?, zone)
}

/// `None` unless there is at least one entry and every entry is complete.
fn readings(input: Option<Vec<FridgeTemperatureInput>>) -> Option<Vec<NewReading>> {
    let input = input.filter(|entries| !entries.is_empty())?;
    input
        .into_iter()
        .map(|entry| {
            Some(NewReading {
                fridge_id: entry.fridge_id?,
                temperature: entry.temperature.filter(|t| t.is_finite())?,
            })
        })
        .collect()
}

impl From<Fridge> for FridgeDto {
    fn from(f: Fridge) -> Self {
        Self {
            id: f.id,
            name: f.name,
        }
    }
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
        }
    }
}

impl From<ReadingDetails> for ReadingDto {
    fn from(r: ReadingDetails) -> Self {
        Self {
            id: r.id,
            record_id: r.record_id,
            fridge_id: r.fridge.id,
            temperature: r.temperature,
            fridge: r.fridge.into(),
        }
    }
}

impl From<RecordDetails> for RecordDto {
    fn from(r: RecordDetails) -> Self {
        Self {
            id: r.id,
            user_id: r.user.id,
            recorded_at: r.recorded_at,
            user: r.user.into(),
            readings: r.readings.into_iter().map(Into::into).collect(),
        }
    }
}
