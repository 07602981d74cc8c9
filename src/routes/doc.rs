use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        audit::AuditLogList,
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        orders::{CreateOrderRequest, CreateOrderResponse, OrderItemRequest, OrderList, OrderWithItems},
        payments::{CreatePaymentRequest, CreatePaymentResponse, PaymentList},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reports::{MonthlySalesReport, SalesSummary},
    },
    models::{
        AuditAction, AuditLog, Order, OrderItem, OrderStatus, Payment, PaymentMethod,
        PaymentStatus, Product, User,
    },
    response::{ApiResponse, Meta},
    routes::{audit, auth, health, orders, params, payments, products, reports},
};

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

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        payments::create_payment,
        payments::list_payments,
        reports::monthly_sales,
        audit::list_audit_logs
    ),
    components(
        schemas(
            User,
            Product,
            Order,
            OrderItem,
            Payment,
            AuditLog,
            OrderStatus,
            PaymentMethod,
            PaymentStatus,
            AuditAction,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            OrderItemRequest,
            CreateOrderResponse,
            OrderList,
            OrderWithItems,
            CreatePaymentRequest,
            CreatePaymentResponse,
            PaymentList,
            MonthlySalesReport,
            SalesSummary,
            AuditLogList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::AuditListQuery,
            params::MonthlySalesQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentList>,
            ApiResponse<MonthlySalesReport>,
            ApiResponse<AuditLogList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order workflow endpoints"),
        (name = "Payments", description = "Payment workflow endpoints"),
        (name = "Reports", description = "Sales reporting endpoints"),
        (name = "Audit", description = "Audit log endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
