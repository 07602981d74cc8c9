use axum::Router;

use crate::state::AppState;

pub mod audit;
pub mod auth;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod reports;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/reports", reports::router())
        .nest("/audit-logs", audit::router())
}
