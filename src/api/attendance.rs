use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{AttendanceQuery, AttendanceStatus, NewAttendance, deserialize_day};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    #[schema(example = 1042)]
    pub student_id: u64,
    #[schema(example = 7)]
    pub class_id: u64,
    /// Day being marked; defaults to today. Time of day is ignored.
    #[serde(default, deserialize_with = "deserialize_day")]
    #[schema(example = "2026-03-02", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[schema(example = "present")]
    pub status: AttendanceStatus,
    #[schema(example = "Physics")]
    pub subject: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntry {
    #[schema(example = 1042)]
    pub student_id: u64,
    #[schema(example = "absent")]
    pub status: AttendanceStatus,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkAttendance {
    #[schema(example = 7)]
    pub class_id: u64,
    #[serde(default, deserialize_with = "deserialize_day")]
    #[schema(example = "2026-03-02", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub subject: Option<String>,
    pub records: Vec<BulkEntry>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceListQuery {
    /// First day, inclusive (YYYY-MM-DD)
    #[serde(default, deserialize_with = "deserialize_day")]
    #[param(value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    /// Last day, inclusive (YYYY-MM-DD)
    #[serde(default, deserialize_with = "deserialize_day")]
    #[param(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub student_id: Option<u64>,
}

async fn ensure_class(state: &AppState, class_id: u64) -> Result<(), AppError> {
    match state.classes.get(class_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Class {} not found", class_id))),
    }
}

/// Mark one student for one day
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 201, description = "Attendance marked", body = Object, example = json!({
            "success": true,
            "data": {
                "id": 1,
                "studentId": 1042,
                "classId": 7,
                "date": "2026-03-02",
                "status": "present",
                "markedBy": 12,
                "markedByRole": "teacher",
                "subject": "Physics",
                "createdOn": "2026-03-02T08:15:00Z"
            }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown class"),
        (status = 409, description = "Already marked for that day", body = Object, example = json!({
            "success": false,
            "message": "Attendance already marked for student 1042 on 2026-03-02"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<MarkAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_marker()?;

    let payload = payload.into_inner();
    ensure_class(&state, payload.class_id).await?;

    let record = state
        .writer
        .mark_one(NewAttendance {
            student_id: payload.student_id,
            class_id: payload.class_id,
            date: payload.date.unwrap_or_else(|| Utc::now().date_naive()),
            status: payload.status,
            marked_by: auth.user_id,
            marked_by_role: auth.role,
            subject: payload.subject,
        })
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": record
    })))
}

/// Mark a whole class for one day
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = BulkMarkAttendance,
    responses(
        (status = 200, description = "Batch processed; failures are listed per student", body = BulkMarkReport),
        (status = 400, description = "Empty batch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown class")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn bulk_mark_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<BulkMarkAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_marker()?;

    let payload = payload.into_inner();
    if payload.records.is_empty() {
        return Err(AppError::BadRequest("records cannot be empty".to_string()));
    }
    ensure_class(&state, payload.class_id).await?;

    let date = payload.date.unwrap_or_else(|| Utc::now().date_naive());
    let batch = payload
        .records
        .into_iter()
        .map(|entry| NewAttendance {
            student_id: entry.student_id,
            class_id: payload.class_id,
            date,
            status: entry.status,
            marked_by: auth.user_id,
            marked_by_role: auth.role,
            subject: payload.subject.clone(),
        })
        .collect();

    tracing::debug!(user = %auth.username, class_id = payload.class_id, %date, "Bulk mark requested");
    let report = state.writer.mark_bulk(batch).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// List raw attendance records
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "Matching records, oldest first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<AttendanceListQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let records = state
        .records
        .find(&AttendanceQuery {
            start: query.start_date,
            end: query.end_date,
            class_id: query.class_id,
            class_ids: None,
            student_id: query.student_id,
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": records
    })))
}
