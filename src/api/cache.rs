use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde_json::json;

/// Number of live cache entries
#[utoipa::path(
    get,
    path = "/api/cache/stats",
    responses(
        (status = 200, description = "Cache size", body = Object, example = json!({
            "success": true,
            "entries": 12
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cache"
)]
pub async fn cache_stats(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let entries = state.cache.entry_count().await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "entries": entries
    })))
}

/// Drop every cached result
#[utoipa::path(
    delete,
    path = "/api/cache",
    responses(
        (status = 200, description = "Cache flushed", body = Object, example = json!({
            "success": true,
            "message": "Cache flushed"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cache"
)]
pub async fn flush_cache(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    state.cache.flush_all().await?;
    tracing::warn!(user = %auth.username, "Query cache flushed by admin");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Cache flushed"
    })))
}
