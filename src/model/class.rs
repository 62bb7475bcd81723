use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Campus {
    #[serde(alias = "boys")]
    Boys,
    #[serde(alias = "girls")]
    Girls,
}

impl Campus {
    /// Key used for this campus in breakdown maps
    pub fn key(self) -> &'static str {
        match self {
            Campus::Boys => "boys",
            Campus::Girls => "girls",
        }
    }
}

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
pub enum Grade {
    #[serde(rename = "11th")]
    #[strum(serialize = "11th")]
    Eleventh,
    #[serde(rename = "12th")]
    #[strum(serialize = "12th")]
    Twelfth,
}

/// Floor number for a (campus, grade) pair:
/// Boys/11th → 1, Boys/12th → 2, Girls/11th → 3, Girls/12th → 4.
pub fn floor_of(campus: Campus, grade: Grade) -> u8 {
    match (campus, grade) {
        (Campus::Boys, Grade::Eleventh) => 1,
        (Campus::Boys, Grade::Twelfth) => 2,
        (Campus::Girls, Grade::Eleventh) => 3,
        (Campus::Girls, Grade::Twelfth) => 4,
    }
}

/// Two-way label reported by the floor breakdown. Both campuses number their
/// 11th-grade floor "1st" and their 12th-grade floor "2nd".
pub fn floor_label(campus: Campus, grade: Grade) -> &'static str {
    match floor_of(campus, grade) {
        1 | 3 => "1st",
        _ => "2nd",
    }
}

fn placement_of_floor(floor: u8) -> Option<(Campus, Grade)> {
    match floor {
        1 => Some((Campus::Boys, Grade::Eleventh)),
        2 => Some((Campus::Boys, Grade::Twelfth)),
        3 => Some((Campus::Girls, Grade::Eleventh)),
        4 => Some((Campus::Girls, Grade::Twelfth)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: u64,
    pub name: String,
    pub campus: Campus,
    pub grade: Grade,
    pub program: String,
    pub floor: u8,
}

impl ClassRecord {
    pub fn new(id: u64, name: impl Into<String>, campus: Campus, grade: Grade, program: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            campus,
            grade,
            program: program.into(),
            floor: floor_of(campus, grade),
        }
    }

    pub fn floor_label(&self) -> &'static str {
        floor_label(self.campus, self.grade)
    }
}

/// Class definition as it appears in seed files; the floor is always derived.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSeed {
    pub id: u64,
    pub name: String,
    pub campus: Campus,
    pub grade: Grade,
    pub program: String,
}

impl From<ClassSeed> for ClassRecord {
    fn from(seed: ClassSeed) -> Self {
        ClassRecord::new(seed.id, seed.name, seed.campus, seed.grade, seed.program)
    }
}

/// Floor filter. Accepts the breakdown label ("1st", "2nd") or a floor number ("1".."4").
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FloorFilter {
    Label(Grade),
    Number(Campus, Grade),
}

impl FloorFilter {
    pub fn matches(&self, class: &ClassRecord) -> bool {
        match *self {
            FloorFilter::Label(grade) => class.grade == grade,
            FloorFilter::Number(campus, grade) => class.campus == campus && class.grade == grade,
        }
    }
}

impl fmt::Display for FloorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FloorFilter::Label(Grade::Eleventh) => f.write_str("1st"),
            FloorFilter::Label(Grade::Twelfth) => f.write_str("2nd"),
            FloorFilter::Number(campus, grade) => write!(f, "{}", floor_of(campus, grade)),
        }
    }
}

impl FromStr for FloorFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1st" => Ok(FloorFilter::Label(Grade::Eleventh)),
            "2nd" => Ok(FloorFilter::Label(Grade::Twelfth)),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(placement_of_floor)
                .map(|(campus, grade)| FloorFilter::Number(campus, grade))
                .ok_or_else(|| format!("unknown floor: {}", s)),
        }
    }
}

/// Candidate-class filters used by the class breakdown.
#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub campus: Option<Campus>,
    pub floor: Option<FloorFilter>,
    pub program: Option<String>,
    pub class_id: Option<u64>,
}

impl ClassFilter {
    pub fn matches(&self, class: &ClassRecord) -> bool {
        self.campus.is_none_or(|c| class.campus == c)
            && self.floor.is_none_or(|f| f.matches(class))
            && self.program.as_deref().is_none_or(|p| class.program == p)
            && self.class_id.is_none_or(|id| class.id == id)
    }
}
