pub mod day;
pub mod service;

pub use day::{parse_recorded_at, DayWindow, LocalZone};
pub use service::{NewRecord, RecordError, RecordService, RecordUpdate};
