use crate::analytics::overview::OverviewParams;
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::deserialize_day;
use crate::model::class::Campus;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OverviewQuery {
    /// First day, inclusive (YYYY-MM-DD). Defaults to the start of records.
    #[serde(default, deserialize_with = "deserialize_day")]
    #[param(value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    /// Last day, inclusive (YYYY-MM-DD). Defaults to today.
    #[serde(default, deserialize_with = "deserialize_day")]
    #[param(value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub campus: Option<Campus>,
    /// "1st" / "2nd", or a floor number 1-4
    pub floor: Option<String>,
    pub program: Option<String>,
    pub class_id: Option<u64>,
    /// Skip the cache and recompute
    pub fresh: Option<bool>,
}

impl OverviewQuery {
    fn split(self) -> (OverviewParams, bool) {
        let use_cache = !self.fresh.unwrap_or(false);
        let params = OverviewParams {
            start_date: self.start_date,
            end_date: self.end_date,
            campus: self.campus,
            floor: self.floor.filter(|f| !f.trim().is_empty()),
            program: self.program.filter(|p| !p.trim().is_empty()),
            class_id: self.class_id,
        };
        (params, use_cache)
    }
}

/// Attendance overview across campuses, floors, programs and classes
#[utoipa::path(
    get,
    path = "/api/attendance/overview",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Composite attendance overview", body = Object, example = json!({
            "success": true,
            "data": {
                "basicStats": {
                    "totalStudents": 1,
                    "presentStudents": 1,
                    "absentStudents": 0,
                    "lateStudents": 0,
                    "totalRecords": 1,
                    "attendancePercentage": 100
                },
                "campusBreakdown": {
                    "boys": { "total": 1, "present": 1, "absent": 0, "late": 0, "totalRecords": 1, "percentage": 100 }
                },
                "floorBreakdown": {
                    "boys": { "1st": { "total": 1, "present": 1, "absent": 0, "late": 0, "totalRecords": 1, "percentage": 100 } }
                },
                "programBreakdown": {
                    "boys": { "ICS": { "total": 1, "present": 1, "absent": 0, "late": 0, "totalRecords": 1, "percentage": 100 } }
                },
                "classBreakdown": {},
                "dateRange": { "start": "1970-01-01", "end": "2026-03-02" },
                "timestamp": "2026-03-02T08:15:00Z"
            }
        })),
        (status = 400, description = "Invalid filters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Analytics"
)]
pub async fn get_overview(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<OverviewQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let (params, use_cache) = query.into_inner().split();
    let overview = state.overview.get_optimized_overview(&params, use_cache).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": overview
    })))
}
