use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditAction, Product},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

/// Catalog read; soft-deleted products never appear.
pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(Column::Deleted.eq(false));

    if let Some(name) = query.name.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", name);
        condition = condition.add(Expr::col(Column::Name).ilike(pattern));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| !p.deleted)
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Product",
        product_from_entity(product),
        None,
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price < 0 {
        return Err(AppError::BadRequest("Price must not be negative".into()));
    }

    let txn = state.orm.begin().await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        created_at: NotSet,
        updated_at: NotSet,
        deleted: Set(false),
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Create,
        "products",
        Some(product.id),
        None,
        Some(serde_json::json!({ "name": product.name, "price": product.price })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        None,
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::BadRequest("Price must not be negative".into()));
        }
    }

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(id)
        .one(&txn)
        .await?
        .filter(|p| !p.deleted)
        .ok_or(AppError::NotFound)?;

    let old_values = serde_json::json!({
        "name": product.name,
        "description": product.description,
        "price": product.price,
    });

    let mut active: ActiveModel = product.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Update,
        "products",
        Some(product.id),
        Some(old_values),
        Some(serde_json::json!({
            "name": product.name,
            "description": product.description,
            "price": product.price,
        })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        None,
    ))
}

/// Soft delete: the row stays so historical order items keep a valid target.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    ip: Option<String>,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(id)
        .one(&txn)
        .await?
        .filter(|p| !p.deleted)
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = product.into();
    active.deleted = Set(true);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    audit::record(
        &txn,
        Some(user.user_id),
        AuditAction::Delete,
        "products",
        Some(product.id),
        Some(serde_json::json!({ "deleted": false })),
        Some(serde_json::json!({ "deleted": true })),
        ip,
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Product soft deleted",
        product_from_entity(product),
        None,
    ))
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        deleted: model.deleted,
    }
}
