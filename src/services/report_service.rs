use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{
    dto::reports::{MonthlySalesReport, SalesSummary},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::MonthlySalesQuery,
    state::AppState,
};

/// Admin-only read over committed orders; no audit entry is written.
pub async fn monthly_sales(
    state: &AppState,
    user: &AuthUser,
    query: MonthlySalesQuery,
) -> AppResult<ApiResponse<MonthlySalesReport>> {
    ensure_admin(user)?;

    let (year, month) = match (query.year, query.month) {
        (Some(year), Some(month)) => (year, month),
        _ => return Err(AppError::BadRequest("year and month required".into())),
    };
    if !(1..=12).contains(&month) {
        return Err(AppError::BadRequest("month must be 1-12".into()));
    }
    let (start, end) = month_bounds(year, month)
        .ok_or_else(|| AppError::BadRequest("invalid year/month".into()))?;

    let orders: Vec<(OrderStatus, i64)> = Orders::find()
        .filter(OrderCol::CreatedAt.gte(start))
        .filter(OrderCol::CreatedAt.lt(end))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|order| (order.status, order.total_amount))
        .collect();

    let report = MonthlySalesReport {
        year,
        month,
        report: summarize(&orders),
    };
    Ok(ApiResponse::success("Ok", report, Some(Meta::empty())))
}

/// Partition one month of orders by status. Revenue counts completed orders
/// only; the average is 0 when nothing completed.
fn summarize(orders: &[(OrderStatus, i64)]) -> SalesSummary {
    let mut summary = SalesSummary {
        total_orders: orders.len() as i64,
        ..Default::default()
    };
    for (status, amount) in orders {
        match status {
            OrderStatus::Completed => {
                summary.completed_orders += 1;
                summary.total_revenue += amount;
            }
            OrderStatus::Pending => summary.pending_orders += 1,
            OrderStatus::Cancelled => summary.cancelled_orders += 1,
        }
    }
    summary.avg_order_value = if summary.completed_orders > 0 {
        summary.total_revenue / summary.completed_orders
    } else {
        0
    };
    summary
}

/// Half-open [start of month, start of next month) in UTC.
fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let midnight = |date: NaiveDate| {
        date.and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
    };
    Some((midnight(start)?, midnight(end)?))
}
