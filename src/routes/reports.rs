use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::reports::MonthlySalesReport,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::MonthlySalesQuery,
    services::report_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/monthly-sales", get(monthly_sales))
}

#[utoipa::path(
    get,
    path = "/reports/monthly-sales",
    params(("year" = Option<i32>, Query), ("month" = Option<u32>, Query)),
    responses(
        (status = 200, description = "Monthly sales summary", body = ApiResponse<MonthlySalesReport>),
        (status = 400, description = "Missing or invalid month"),
        (status = 403, description = "Admins only")
    ),
    tag = "Reports"
)]
pub async fn monthly_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MonthlySalesQuery>,
) -> AppResult<Json<ApiResponse<MonthlySalesReport>>> {
    let resp = report_service::monthly_sales(&state, &user, query).await?;
    Ok(Json(resp))
}
