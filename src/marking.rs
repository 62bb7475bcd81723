//! Write path: persist attendance, then invalidate cached analytics.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::cache::{CacheInvalidationHook, WriteEvent};
use crate::error::AppResult;
use crate::model::attendance::{AttendanceRecord, NewAttendance};
use crate::store::AttendanceRecordStore;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkFailure {
    #[schema(example = 1042)]
    pub student_id: u64,
    #[schema(example = "Attendance already marked for student 1042 on 2026-03-02")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkReport {
    pub success: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BulkMarkFailure>,
}

#[derive(Clone)]
pub struct AttendanceWriter {
    store: Arc<dyn AttendanceRecordStore>,
    hook: CacheInvalidationHook,
}

impl AttendanceWriter {
    pub fn new(store: Arc<dyn AttendanceRecordStore>, hook: CacheInvalidationHook) -> Self {
        Self { store, hook }
    }

    pub async fn mark_one(&self, new: NewAttendance) -> AppResult<AttendanceRecord> {
        let record = self.store.insert(new).await?;
        self.hook
            .after_write(&WriteEvent::from_records([&record]))
            .await?;

        info!(
            student_id = record.student_id,
            class_id = record.class_id,
            date = %record.date,
            status = %record.status,
            "Attendance marked"
        );
        Ok(record)
    }

    /// Inserts run together; each failure is reported, not raised.
    pub async fn mark_bulk(&self, batch: Vec<NewAttendance>) -> AppResult<BulkMarkReport> {
        let inserts = batch.into_iter().map(|new| {
            let student_id = new.student_id;
            let store = self.store.clone();
            async move { (student_id, store.insert(new).await) }
        });

        let mut stored = Vec::new();
        let mut errors = Vec::new();
        for (student_id, result) in join_all(inserts).await {
            match result {
                Ok(record) => stored.push(record),
                Err(e) => {
                    warn!(error = %e, student_id, "Bulk mark entry failed");
                    errors.push(BulkMarkFailure {
                        student_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.hook.after_write(&WriteEvent::from_records(&stored)).await?;

        info!(
            success_count = stored.len(),
            failure_count = errors.len(),
            "Bulk attendance processed"
        );

        Ok(BulkMarkReport {
            success: errors.is_empty(),
            success_count: stored.len(),
            failure_count: errors.len(),
            errors,
        })
    }
}
