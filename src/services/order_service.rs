use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, CreateOrderResponse, OrderList, OrderWithItems},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        payments::{Column as PaymentCol, Entity as Payments},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, authorize},
    models::{AuditAction, Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::payment_service::payment_from_entity,
    state::AppState,
};

/// Resolve every line item against the catalog, snapshot prices into the
/// order items and persist order + items + audit entry as one transaction.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order items required".into()));
    }

    let txn = state.orm.begin().await?;

    let mut total_amount: i64 = 0;
    let mut resolved: Vec<(Uuid, i32, i64)> = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let quantity = item.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(AppError::BadRequest("Quantity must be at least 1".into()));
        }
        let product = Products::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .filter(|p| !p.deleted)
            .ok_or(AppError::NotFound)?;

        total_amount += product.price * quantity as i64;
        resolved.push((product.id, quantity, product.price));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (product_id, quantity, price) in resolved {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price),
        }
        .insert(&txn)
        .await?;
    }

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Create,
        "order",
        Some(order.id),
        None,
        Some(serde_json::json!({ "total_amount": total_amount, "status": "pending" })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Order created",
        CreateOrderResponse {
            order_id: order.id,
            total: total_amount,
        },
        Some(Meta::empty()),
    ))
}

/// Admins see every order; everyone else only their own.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::try_from_value(status)
            .map_err(|_| AppError::BadRequest("Invalid order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    authorize(user, Some(order.user_id), false)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .map(payment_from_entity);

    Ok(ApiResponse::success(
        "Ok",
        OrderWithItems {
            order: order_from_entity(order),
            items,
            payment,
        },
        Some(Meta::empty()),
    ))
}

/// pending -> cancelled; completed and cancelled are terminal.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    authorize(user, Some(order.user_id), false)?;

    match order.status {
        OrderStatus::Completed => {
            return Err(AppError::BadRequest("Cannot cancel completed order".into()));
        }
        OrderStatus::Cancelled => {
            return Err(AppError::BadRequest("Order already cancelled".into()));
        }
        OrderStatus::Pending => {}
    }

    let old_status = order.status;
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Update,
        "order",
        Some(order.id),
        Some(serde_json::json!({ "status": old_status })),
        Some(serde_json::json!({ "status": order.status })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
    }
}
