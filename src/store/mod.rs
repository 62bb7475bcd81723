//! Persistence collaborators read by the analytics layer and written by the marking path.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::model::attendance::{AttendanceQuery, AttendanceRecord, NewAttendance};
use crate::model::class::{ClassFilter, ClassRecord};

pub mod memory;
pub mod mysql;

#[async_trait]
pub trait AttendanceRecordStore: Send + Sync {
    async fn find(&self, query: &AttendanceQuery) -> AppResult<Vec<AttendanceRecord>>;

    /// Persist a record. Fails with `AppError::AlreadyMarked` when the student
    /// already has a record for that day.
    async fn insert(&self, record: NewAttendance) -> AppResult<AttendanceRecord>;
}

#[async_trait]
pub trait ClassCatalog: Send + Sync {
    async fn get(&self, id: u64) -> AppResult<Option<ClassRecord>>;

    async fn find(&self, filter: &ClassFilter) -> AppResult<Vec<ClassRecord>>;

    async fn all(&self) -> AppResult<Vec<ClassRecord>> {
        self.find(&ClassFilter::default()).await
    }
}
