use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::audit::AuditLogList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::AuditListQuery,
    services::audit_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_audit_logs))
}

#[utoipa::path(
    get,
    path = "/audit-logs",
    params(
        ("page" = Option<i64>, Query),
        ("per_page" = Option<i64>, Query),
        ("table" = Option<String>, Query),
        ("action" = Option<String>, Query)
    ),
    responses(
        (status = 200, description = "List audit logs newest-first", body = ApiResponse<AuditLogList>),
        (status = 403, description = "Admins only")
    ),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AuditListQuery>,
) -> AppResult<Json<ApiResponse<AuditLogList>>> {
    let resp = audit_service::list_audit_logs(&state, &user, query).await?;
    Ok(Json(resp))
}
