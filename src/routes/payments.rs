use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::payments::{CreatePaymentRequest, CreatePaymentResponse, PaymentList},
    error::AppResult,
    middleware::auth::{AuthUser, ClientIp},
    response::ApiResponse,
    routes::params::Pagination,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_payments).post(create_payment))
}

#[utoipa::path(
    post,
    path = "/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = ApiResponse<CreatePaymentResponse>),
        (status = 400, description = "Invalid method or cancelled order"),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Missing order"),
        (status = 409, description = "Payment already exists")
    ),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ClientIp(ip): ClientIp,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatePaymentResponse>>)> {
    let resp = payment_service::create_payment(&state, &user, ip, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/payments",
    params(("page" = Option<i64>, Query), ("per_page" = Option<i64>, Query)),
    responses(
        (status = 200, description = "List payments", body = ApiResponse<PaymentList>),
        (status = 403, description = "Admins only")
    ),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}
