use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::class::{Campus, Grade};

/// Inclusive calendar-day range.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Earliest day the system reports on when no start date is given.
    pub fn system_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Fill in missing bounds: start of system through today.
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: start.unwrap_or_else(Self::system_start),
            end: end.unwrap_or_else(|| Utc::now().date_naive()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    pub total_students: u64,
    pub present_students: u64,
    pub absent_students: u64,
    pub late_students: u64,
    pub total_records: u64,
    pub attendance_percentage: u32,
}

/// Per-group figures shared by the campus, floor, program and class breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownStats {
    /// distinct students
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub total_records: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub class_name: String,
    pub campus: Campus,
    pub grade: Grade,
    pub program: String,
    pub floor: u8,
    #[serde(flatten)]
    pub stats: BreakdownStats,
}

pub type CampusBreakdown = BTreeMap<String, BreakdownStats>;
/// campus key → group label → stats
pub type NestedBreakdown = BTreeMap<String, BTreeMap<String, BreakdownStats>>;
pub type ClassBreakdown = BTreeMap<u64, ClassStats>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResult {
    pub basic_stats: BasicStats,
    pub campus_breakdown: CampusBreakdown,
    pub floor_breakdown: NestedBreakdown,
    pub program_breakdown: NestedBreakdown,
    pub class_breakdown: ClassBreakdown,
    pub date_range: DateRange,
    pub timestamp: DateTime<Utc>,
}

/// Whole-number percentage, 0 when there is nothing to divide by.
pub fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}
