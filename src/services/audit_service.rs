use chrono::Utc;
use sea_orm::{
    ActiveEnum, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::{
    dto::audit::AuditLogList,
    entity::audit_logs::{Column, Entity as AuditLogs, Model as AuditLogModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditAction, AuditLog},
    response::{ApiResponse, Meta},
    routes::params::AuditListQuery,
    state::AppState,
};

/// Admin-only, newest-first listing with optional table/action filters.
pub async fn list_audit_logs(
    state: &AppState,
    user: &AuthUser,
    query: AuditListQuery,
) -> AppResult<ApiResponse<AuditLogList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(table) = query.table.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::TableName.eq(table.clone()));
    }
    if let Some(action) = query.action.as_ref().filter(|s| !s.is_empty()) {
        let action = AuditAction::try_from_value(&action.to_uppercase())
            .map_err(|_| AppError::BadRequest("Invalid audit action".into()))?;
        condition = condition.add(Column::Action.eq(action));
    }

    let finder = AuditLogs::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(audit_log_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        AuditLogList { items },
        Some(meta),
    ))
}

fn audit_log_from_entity(model: AuditLogModel) -> AuditLog {
    AuditLog {
        id: model.id,
        user_id: model.user_id,
        action: model.action,
        table_name: model.table_name,
        record_id: model.record_id,
        old_values: model.old_values,
        new_values: model.new_values,
        ip_address: model.ip_address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
