use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlySalesReport {
    pub year: i32,
    pub month: u32,
    pub report: SalesSummary,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub completed_orders: i64,
    pub pending_orders: i64,
    pub cancelled_orders: i64,
    /// Sum of total_amount over completed orders only.
    pub total_revenue: i64,
    /// total_revenue / completed_orders, 0 when nothing completed.
    pub avg_order_value: i64,
}
