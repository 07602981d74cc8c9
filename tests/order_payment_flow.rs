use axum_storefront_api::{
    db::create_pool,
    dto::orders::{CreateOrderRequest, OrderItemRequest},
    dto::payments::CreatePaymentRequest,
    entity::{
        AuditLogs, Orders,
        audit_logs::Column as AuditCol,
        products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentStatus},
    routes::params::{AuditListQuery, MonthlySalesQuery, OrderListQuery, Pagination},
    services::{audit_service, order_service, payment_service, report_service},
    state::AppState,
};
use chrono::{Datelike, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Integration flow: user orders from the catalog, pays, hits every invalid
// transition, and the admin reads the report and the audit trail.
#[tokio::test]
async fn order_payment_report_and_audit_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let stranger_id = create_user(&state, "user", "stranger@example.com").await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };
    let auth_stranger = AuthUser {
        user_id: stranger_id,
        role: "user".into(),
    };

    let widget = create_product(&state, "Test Widget", 1000, false).await?;
    let gone = create_product(&state, "Withdrawn Widget", 500, true).await?;

    // Create order: total is the snapshot price times quantity.
    let created = order_service::create_order(
        &state,
        &auth_user,
        None,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: widget,
                quantity: Some(2),
            }],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.total, 2000);

    let detail = order_service::get_order(&state, &auth_user, created.order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].price, 1000);
    assert!(detail.payment.is_none());

    // A later price change must not touch the snapshotted item price.
    set_product_price(&state, widget, 9999).await?;
    let detail = order_service::get_order(&state, &auth_user, created.order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.items[0].price, 1000);
    assert_eq!(detail.order.total_amount, 2000);

    // Ordering a soft-deleted product aborts with nothing written.
    let orders_before = Orders::find().count(&state.orm).await?;
    let audit_before = order_audit_count(&state).await?;
    let err = order_service::create_order(
        &state,
        &auth_user,
        None,
        CreateOrderRequest {
            items: vec![
                OrderItemRequest {
                    product_id: widget,
                    quantity: Some(1),
                },
                OrderItemRequest {
                    product_id: gone,
                    quantity: Some(1),
                },
            ],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    assert_eq!(Orders::find().count(&state.orm).await?, orders_before);
    assert_eq!(order_audit_count(&state).await?, audit_before);

    // Empty item list is rejected up front.
    let err = order_service::create_order(
        &state,
        &auth_user,
        None,
        CreateOrderRequest { items: vec![] },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Only the owner and admins may read or cancel the order.
    let err = order_service::get_order(&state, &auth_stranger, created.order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let err = order_service::cancel_order(&state, &auth_stranger, None, created.order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert!(
        order_service::get_order(&state, &auth_admin, created.order_id)
            .await
            .is_ok()
    );

    // Unknown payment method is a 400, not a state change.
    let err = payment_service::create_payment(
        &state,
        &auth_user,
        None,
        CreatePaymentRequest {
            order_id: created.order_id,
            payment_method: "cheque".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Paying completes the order and the payment in one transaction.
    let paid = payment_service::create_payment(
        &state,
        &auth_user,
        None,
        CreatePaymentRequest {
            order_id: created.order_id,
            payment_method: "card".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.amount, 2000);
    assert!(!paid.transaction_id.is_empty());

    let detail = order_service::get_order(&state, &auth_user, created.order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.status, OrderStatus::Completed);
    let payment = detail.payment.expect("payment bound to order");
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id, paid.transaction_id);

    // At most one payment per order.
    let err = payment_service::create_payment(
        &state,
        &auth_user,
        None,
        CreatePaymentRequest {
            order_id: created.order_id,
            payment_method: "cash".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Completed is terminal.
    let err = order_service::cancel_order(&state, &auth_user, None, created.order_id)
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Cannot cancel completed order"),
        other => panic!("unexpected error: {other:?}"),
    }

    // Second order: cancel path, then cancelled is terminal too.
    let second = order_service::create_order(
        &state,
        &auth_user,
        None,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: widget,
                quantity: None,
            }],
        },
    )
    .await?
    .data
    .unwrap();
    // Quantity defaulted to 1 at the post-update price.
    assert_eq!(second.total, 9999);

    let cancelled = order_service::cancel_order(&state, &auth_user, None, second.order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = order_service::cancel_order(&state, &auth_user, None, second.order_id)
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Order already cancelled"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = payment_service::create_payment(
        &state,
        &auth_user,
        None,
        CreatePaymentRequest {
            order_id: second.order_id,
            payment_method: "cash".into(),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Cannot pay for cancelled order"),
        other => panic!("unexpected error: {other:?}"),
    }

    // Role-scoped listing: the owner sees two orders, the stranger none.
    let mine = order_service::list_orders(&state, &auth_user, order_query())
        .await?
        .data
        .unwrap();
    assert_eq!(mine.items.len(), 2);
    let theirs = order_service::list_orders(&state, &auth_stranger, order_query())
        .await?
        .data
        .unwrap();
    assert!(theirs.items.is_empty());
    let all = order_service::list_orders(&state, &auth_admin, order_query())
        .await?
        .data
        .unwrap();
    assert_eq!(all.items.len(), 2);

    // Payments listing is admin-only.
    let err = payment_service::list_payments(&state, &auth_user, Pagination::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let payments = payment_service::list_payments(&state, &auth_admin, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(payments.items.len(), 1);

    // Monthly report over this month: one completed (2000), one cancelled.
    let now = Utc::now();
    let report = report_service::monthly_sales(
        &state,
        &auth_admin,
        MonthlySalesQuery {
            year: Some(now.year()),
            month: Some(now.month()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(report.report.total_orders, 2);
    assert_eq!(report.report.completed_orders, 1);
    assert_eq!(report.report.cancelled_orders, 1);
    assert_eq!(report.report.pending_orders, 0);
    assert_eq!(report.report.total_revenue, 2000);
    assert_eq!(report.report.avg_order_value, 2000);

    // A month with no orders reports zero revenue and a zero average.
    let empty = report_service::monthly_sales(
        &state,
        &auth_admin,
        MonthlySalesQuery {
            year: Some(2000),
            month: Some(1),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(empty.report.total_orders, 0);
    assert_eq!(empty.report.avg_order_value, 0);

    let err = report_service::monthly_sales(
        &state,
        &auth_admin,
        MonthlySalesQuery {
            year: Some(now.year()),
            month: Some(13),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = report_service::monthly_sales(
        &state,
        &auth_user,
        MonthlySalesQuery {
            year: Some(now.year()),
            month: Some(now.month()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Audit trail: admin-only, newest first, filterable.
    let err = audit_service::list_audit_logs(&state, &auth_user, audit_query(None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let logs = audit_service::list_audit_logs(&state, &auth_admin, audit_query(None, None))
        .await?
        .data
        .unwrap();
    // create x2 + cancel for orders, one payment.
    assert_eq!(logs.items.len(), 4);
    for pair in logs.items.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }

    let payment_logs = audit_service::list_audit_logs(
        &state,
        &auth_admin,
        audit_query(Some("payment"), Some("create")),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(payment_logs.items.len(), 1);
    assert_eq!(payment_logs.items[0].user_id, Some(user_id));

    Ok(())
}

fn order_query() -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination::default(),
        status: None,
    }
}

fn audit_query(table: Option<&str>, action: Option<&str>) -> AuditListQuery {
    AuditListQuery {
        pagination: Pagination::default(),
        table: table.map(str::to_string),
        action: action.map(str::to_string),
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE audit_logs, payments, order_items, orders, products, users CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState::new(pool))
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    deleted: bool,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        created_at: NotSet,
        updated_at: NotSet,
        deleted: Set(deleted),
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}

async fn set_product_price(state: &AppState, id: Uuid, price: i64) -> anyhow::Result<()> {
    use axum_storefront_api::entity::Products;
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .expect("product exists");
    let mut active: ProductActive = product.into();
    active.price = Set(price);
    active.update(&state.orm).await?;
    Ok(())
}

async fn order_audit_count(state: &AppState) -> anyhow::Result<u64> {
    Ok(AuditLogs::find()
        .filter(AuditCol::TableName.eq("order"))
        .count(&state.orm)
        .await?)
}
