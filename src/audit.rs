use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entity::audit_logs::ActiveModel as AuditLogActive, error::AppResult, models::AuditAction,
};

/// Append one audit row. Callers documenting a mutation pass their open
/// transaction so a rolled-back mutation never leaves an orphan entry.
#[allow(clippy::too_many_arguments)]
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<Uuid>,
    action: AuditAction,
    table_name: &str,
    record_id: Option<Uuid>,
    old_values: Option<Value>,
    new_values: Option<Value>,
    ip_address: Option<String>,
) -> AppResult<()> {
    AuditLogActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action),
        table_name: Set(table_name.to_string()),
        record_id: Set(record_id),
        old_values: Set(old_values),
        new_values: Set(new_values),
        ip_address: Set(ip_address),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(())
}
