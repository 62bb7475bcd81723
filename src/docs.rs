use crate::api::attendance::{BulkEntry, BulkMarkAttendance, MarkAttendance};
use crate::marking::{BulkMarkFailure, BulkMarkReport};
use crate::model::attendance::AttendanceStatus;
use crate::model::class::{Campus, ClassRecord, Grade};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Analytics API",
        version = "1.0.0",
        description = r#"
## Attendance Analytics

Marks daily student attendance and serves aggregated attendance statistics
for campuses, floors, programs and classes.

### Key Features
- **Attendance Marking**
  - Mark a single student or a whole class for a day
- **Overview Analytics**
  - Basic stats plus campus, floor, program and class breakdowns
  - Results are cached and invalidated whenever attendance is written
- **Cache Administration**
  - Inspect cache size and flush it

### Security
All endpoints are protected using **JWT Bearer authentication**.
Only admins, coordinators and teachers may mark attendance; only admins may flush the cache.
"#,
    ),
    paths(
        crate::api::attendance::mark_attendance,
        crate::api::attendance::bulk_mark_attendance,
        crate::api::attendance::list_attendance,

        crate::api::overview::get_overview,

        crate::api::cache::cache_stats,
        crate::api::cache::flush_cache
    ),
    components(
        schemas(
            MarkAttendance,
            BulkEntry,
            BulkMarkAttendance,
            BulkMarkReport,
            BulkMarkFailure,
            AttendanceStatus,
            Campus,
            Grade,
            ClassRecord
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance marking APIs"),
        (name = "Analytics", description = "Attendance overview APIs"),
        (name = "Cache", description = "Query cache administration APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
