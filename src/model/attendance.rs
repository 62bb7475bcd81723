use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfLeave,
    FullLeave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub student_id: u64,
    pub class_id: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: u64,
    pub marked_by_role: Role,
    pub subject: Option<String>,
    pub created_on: DateTime<Utc>,
}

/// Insert payload; the store assigns `id` and `created_on`.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: u64,
    pub class_id: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: u64,
    pub marked_by_role: Role,
    pub subject: Option<String>,
}

/// Record lookup filters. Every field narrows the result; `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub class_ids: Option<Vec<u64>>,
    pub student_id: Option<u64>,
}

impl AttendanceQuery {
    pub fn in_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.start.is_none_or(|s| record.date >= s)
            && self.end.is_none_or(|e| record.date <= e)
            && self.class_id.is_none_or(|c| record.class_id == c)
            && self
                .class_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&record.class_id))
            && self.student_id.is_none_or(|s| record.student_id == s)
    }
}

/// Parse a calendar day from either `YYYY-MM-DD` or an RFC 3339 timestamp.
/// Time of day is discarded.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

/// serde helper for optional day fields in request bodies
pub fn deserialize_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_day(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
    }
}
