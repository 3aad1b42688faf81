use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    #[sea_orm(string_value = "registered")]
    Registered,
    #[sea_orm(string_value = "edited")]
    Edited,
    #[sea_orm(string_value = "moved")]
    Moved,
    #[sea_orm(string_value = "maintained")]
    Maintained,
    #[sea_orm(string_value = "status_changed")]
    StatusChanged,
}

/// Append-only audit record. Rows are inserted inside the transaction of
/// the action they describe and are never updated or deleted; corrections
/// are represented as additional entries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub event_type: AuditEvent,
    #[sea_orm(column_type = "Json", nullable)]
    pub payload: Option<serde_json::Value>,
    /// None for system-initiated actions.
    pub actor_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
