use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceQuery, AttendanceRecord, NewAttendance};
use crate::model::class::{ClassFilter, ClassRecord, ClassSeed};
use crate::store::{AttendanceRecordStore, ClassCatalog};

fn poisoned(what: &str) -> AppError {
    AppError::Store(format!("{} lock poisoned", what))
}

#[derive(Default)]
struct RecordTable {
    next_id: u64,
    rows: Vec<AttendanceRecord>,
    marked: HashSet<(u64, NaiveDate)>,
}

/// Process-local attendance store with the same (student, day) uniqueness as the SQL table.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    table: RwLock<RecordTable>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttendanceRecordStore for MemoryAttendanceStore {
    async fn find(&self, query: &AttendanceQuery) -> AppResult<Vec<AttendanceRecord>> {
        let table = self.table.read().map_err(|_| poisoned("attendance"))?;
        Ok(table
            .rows
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, new: NewAttendance) -> AppResult<AttendanceRecord> {
        let mut table = self.table.write().map_err(|_| poisoned("attendance"))?;

        if !table.marked.insert((new.student_id, new.date)) {
            return Err(AppError::AlreadyMarked {
                student_id: new.student_id,
                date: new.date,
            });
        }

        table.next_id += 1;
        let record = AttendanceRecord {
            id: table.next_id,
            student_id: new.student_id,
            class_id: new.class_id,
            date: new.date,
            status: new.status,
            marked_by: new.marked_by,
            marked_by_role: new.marked_by_role,
            subject: new.subject,
            created_on: Utc::now(),
        };
        table.rows.push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct MemoryClassCatalog {
    classes: RwLock<BTreeMap<u64, ClassRecord>>,
}

impl MemoryClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: impl IntoIterator<Item = ClassRecord>) -> Self {
        Self {
            classes: RwLock::new(classes.into_iter().map(|c| (c.id, c)).collect()),
        }
    }

    /// Load classes from a JSON array of `ClassSeed` objects.
    pub fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read class seed file: {}", path.display()))?;
        let seeds: Vec<ClassSeed> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse class seed file: {}", path.display()))?;

        tracing::info!(count = seeds.len(), path = %path.display(), "Loaded class seed");
        Ok(Self::with_classes(seeds.into_iter().map(ClassRecord::from)))
    }
}

#[async_trait]
impl ClassCatalog for MemoryClassCatalog {
    async fn get(&self, id: u64) -> AppResult<Option<ClassRecord>> {
        let classes = self.classes.read().map_err(|_| poisoned("class catalog"))?;
        Ok(classes.get(&id).cloned())
    }

    async fn find(&self, filter: &ClassFilter) -> AppResult<Vec<ClassRecord>> {
        let classes = self.classes.read().map_err(|_| poisoned("class catalog"))?;
        Ok(classes
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }
}
