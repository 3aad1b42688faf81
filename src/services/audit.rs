use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::equipment_audit_log::{self, AuditEvent},
    errors::ServiceError,
};

/// The per-movement action tag embedded in `moved` audit payloads. Keeping
/// the tag a closed enum means every call site produces the same payload
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementAction {
    Requested,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

/// Inserts one audit entry on the given connection.
///
/// Generic over `ConnectionTrait` so workflow commands append inside their
/// own transaction: a failed insert propagates as `DbErr` and rolls back
/// the state change it was meant to record.
pub async fn record_event<C: ConnectionTrait>(
    conn: &C,
    equipment_id: Uuid,
    event_type: AuditEvent,
    payload: serde_json::Value,
    actor_user_id: Option<String>,
) -> Result<equipment_audit_log::Model, DbErr> {
    let entry = equipment_audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        equipment_id: Set(equipment_id),
        event_type: Set(event_type),
        payload: Set(Some(payload)),
        actor_user_id: Set(actor_user_id),
        created_at: Set(Utc::now()),
    };

    entry.insert(conn).await
}

/// Inserts a `moved` audit entry with the canonical movement payload shape.
pub async fn record_movement_event<C: ConnectionTrait>(
    conn: &C,
    equipment_id: Uuid,
    movement_id: Uuid,
    action: MovementAction,
    detail: serde_json::Value,
    actor_user_id: Option<String>,
) -> Result<equipment_audit_log::Model, DbErr> {
    let mut payload = serde_json::json!({
        "movement_id": movement_id,
        "action": action,
    });
    if let (Some(map), Some(extra)) = (payload.as_object_mut(), detail.as_object()) {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }

    record_event(conn, equipment_id, AuditEvent::Moved, payload, actor_user_id).await
}

/// Read side of the audit trail.
#[derive(Clone)]
pub struct AuditLogService {
    db_pool: Arc<DbPool>,
}

impl AuditLogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Returns audit entries for one asset, newest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        equipment_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<equipment_audit_log::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = equipment_audit_log::Entity::find()
            .filter(equipment_audit_log::Column::EquipmentId.eq(equipment_id))
            .order_by_desc(equipment_audit_log::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::from)?;
        let entries = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from)?;

        Ok((entries, total))
    }
}
