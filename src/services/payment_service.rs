use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{CreatePaymentRequest, CreatePaymentResponse, PaymentList},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, authorize, ensure_admin},
    models::{AuditAction, OrderStatus, Payment, PaymentMethod, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Bind a payment to an order and flip the order to completed, all in one
/// transaction. Payments are simulated: they complete synchronously.
pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<CreatePaymentResponse>> {
    let method = PaymentMethod::try_from_value(&payload.payment_method).map_err(|_| {
        AppError::BadRequest(
            "Invalid payment method, only card, cash, and bank_transfer are allowed".into(),
        )
    })?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(payload.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    authorize(user, Some(order.user_id), false)?;

    let existing = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Payment already exists".into()));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest("Cannot pay for cancelled order".into()));
    }

    let amount = order.total_amount;
    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        amount: Set(amount),
        payment_method: Set(method),
        status: Set(PaymentStatus::Completed),
        transaction_id: Set(Uuid::new_v4().to_string()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        // Backstop for two payment requests racing past the check above;
        // the unique index on order_id decides the winner.
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Payment already exists".into())
        }
        _ => err.into(),
    })?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Completed);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Create,
        "payment",
        Some(payment.id),
        None,
        Some(serde_json::json!({
            "order_id": order.id,
            "amount": amount,
            "method": method,
        })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Payment successful",
        CreatePaymentResponse {
            transaction_id: payment.transaction_id,
            amount: payment.amount,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Payments::find().order_by_desc(PaymentCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let payments = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        PaymentList { items: payments },
        Some(meta),
    ))
}

pub fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        amount: model.amount,
        payment_method: model.payment_method,
        status: model.status,
        transaction_id: model.transaction_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
