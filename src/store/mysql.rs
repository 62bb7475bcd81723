use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceQuery, AttendanceRecord, AttendanceStatus, NewAttendance};
use crate::model::class::{Campus, ClassFilter, ClassRecord, FloorFilter, Grade};
use crate::model::role::Role;
use crate::store::{AttendanceRecordStore, ClassCatalog};

/// MySQL duplicate-key SQLSTATE
const DUPLICATE_KEY: &str = "23000";

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

struct WhereClause {
    sql: String,
    args: Vec<FilterValue>,
}

impl WhereClause {
    fn new() -> Self {
        Self {
            sql: String::from(" WHERE 1=1"),
            args: Vec::new(),
        }
    }

    fn push(&mut self, condition: &str, value: FilterValue) {
        self.sql.push_str(" AND ");
        self.sql.push_str(condition);
        self.args.push(value);
    }

    fn push_in(&mut self, column: &str, ids: &[u64]) {
        if ids.is_empty() {
            self.sql.push_str(" AND 1=0");
            return;
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        self.sql
            .push_str(&format!(" AND {} IN ({})", column, placeholders));
        self.args.extend(ids.iter().copied().map(FilterValue::U64));
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    student_id: u64,
    class_id: u64,
    date: NaiveDate,
    status: String,
    marked_by: u64,
    marked_by_role: u8,
    subject: Option<String>,
    created_on: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| {
            AppError::Store(format!("record {} has unknown status {}", row.id, row.status))
        })?;
        let marked_by_role = Role::from_id(row.marked_by_role).ok_or_else(|| {
            AppError::Store(format!("record {} has unknown role {}", row.id, row.marked_by_role))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            student_id: row.student_id,
            class_id: row.class_id,
            date: row.date,
            status,
            marked_by: row.marked_by,
            marked_by_role,
            subject: row.subject,
            created_on: row.created_on,
        })
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRecordStore for MySqlAttendanceStore {
    async fn find(&self, query: &AttendanceQuery) -> AppResult<Vec<AttendanceRecord>> {
        let mut clause = WhereClause::new();

        if let Some(start) = query.start {
            clause.push("date >= ?", FilterValue::Date(start));
        }
        if let Some(end) = query.end {
            clause.push("date <= ?", FilterValue::Date(end));
        }
        if let Some(class_id) = query.class_id {
            clause.push("class_id = ?", FilterValue::U64(class_id));
        }
        if let Some(ids) = &query.class_ids {
            clause.push_in("class_id", ids);
        }
        if let Some(student_id) = query.student_id {
            clause.push("student_id = ?", FilterValue::U64(student_id));
        }

        let sql = format!(
            r#"
            SELECT id, student_id, class_id, date, status, marked_by, marked_by_role, subject, created_on
            FROM attendance_records
            {}
            ORDER BY date, id
            "#,
            clause.sql
        );
        debug!(sql = %sql, args = clause.args.len(), "Fetching attendance records");

        let mut q = sqlx::query_as::<_, AttendanceRow>(&sql);
        for arg in clause.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::Str(s) => q.bind(s),
                FilterValue::Date(d) => q.bind(d),
            };
        }

        let rows = q.fetch_all(&self.pool).await.map_err(|e| {
            error!(error = %e, "Failed to fetch attendance records");
            AppError::Database(e)
        })?;

        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }

    async fn insert(&self, new: NewAttendance) -> AppResult<AttendanceRecord> {
        let created_on = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (student_id, class_id, date, status, marked_by, marked_by_role, subject, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.student_id)
        .bind(new.class_id)
        .bind(new.date)
        .bind(new.status.as_ref())
        .bind(new.marked_by)
        .bind(new.marked_by_role.id())
        .bind(new.subject.as_deref())
        .bind(created_on)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(AttendanceRecord {
                id: done.last_insert_id(),
                student_id: new.student_id,
                class_id: new.class_id,
                date: new.date,
                status: new.status,
                marked_by: new.marked_by,
                marked_by_role: new.marked_by_role,
                subject: new.subject,
                created_on,
            }),
            Err(e) => {
                // Unique key on (student_id, date)
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some(DUPLICATE_KEY) {
                        return Err(AppError::AlreadyMarked {
                            student_id: new.student_id,
                            date: new.date,
                        });
                    }
                }

                error!(error = %e, student_id = new.student_id, "Attendance insert failed");
                Err(AppError::Database(e))
            }
        }
    }
}

#[derive(FromRow)]
struct ClassRow {
    id: u64,
    name: String,
    campus: String,
    grade: String,
    program: String,
}

impl TryFrom<ClassRow> for ClassRecord {
    type Error = AppError;

    fn try_from(row: ClassRow) -> Result<Self, Self::Error> {
        let campus = Campus::from_str(&row.campus).map_err(|_| {
            AppError::Store(format!("class {} has unknown campus {}", row.id, row.campus))
        })?;
        let grade = Grade::from_str(&row.grade).map_err(|_| {
            AppError::Store(format!("class {} has unknown grade {}", row.id, row.grade))
        })?;
        Ok(ClassRecord::new(row.id, row.name, campus, grade, row.program))
    }
}

pub struct MySqlClassCatalog {
    pool: MySqlPool,
}

impl MySqlClassCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassCatalog for MySqlClassCatalog {
    async fn get(&self, id: u64) -> AppResult<Option<ClassRecord>> {
        let row = sqlx::query_as::<_, ClassRow>(
            "SELECT id, name, campus, grade, program FROM classes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, class_id = id, "Failed to fetch class");
            AppError::Database(e)
        })?;

        row.map(ClassRecord::try_from).transpose()
    }

    async fn find(&self, filter: &ClassFilter) -> AppResult<Vec<ClassRecord>> {
        let mut clause = WhereClause::new();

        if let Some(campus) = filter.campus {
            clause.push("campus = ?", FilterValue::Str(campus.to_string()));
        }
        match filter.floor {
            Some(FloorFilter::Label(grade)) => {
                clause.push("grade = ?", FilterValue::Str(grade.to_string()));
            }
            Some(FloorFilter::Number(campus, grade)) => {
                clause.push("campus = ?", FilterValue::Str(campus.to_string()));
                clause.push("grade = ?", FilterValue::Str(grade.to_string()));
            }
            None => {}
        }
        if let Some(program) = &filter.program {
            clause.push("program = ?", FilterValue::Str(program.clone()));
        }
        if let Some(class_id) = filter.class_id {
            clause.push("id = ?", FilterValue::U64(class_id));
        }

        let sql = format!(
            "SELECT id, name, campus, grade, program FROM classes{} ORDER BY id",
            clause.sql
        );
        debug!(sql = %sql, args = clause.args.len(), "Fetching classes");

        let mut q = sqlx::query_as::<_, ClassRow>(&sql);
        for arg in clause.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::Str(s) => q.bind(s),
                FilterValue::Date(d) => q.bind(d),
            };
        }

        let rows = q.fetch_all(&self.pool).await.map_err(|e| {
            error!(error = %e, "Failed to fetch classes");
            AppError::Database(e)
        })?;

        rows.into_iter().map(ClassRecord::try_from).collect()
    }
}
