use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl MovementStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MovementStatus::Rejected | MovementStatus::Completed | MovementStatus::Cancelled
        )
    }
}

/// A transfer request for one equipment asset.
///
/// The origin columns are a snapshot of the asset's location/custodian at
/// request time and are never written again; the execute path compares the
/// snapshot against the live asset row to detect a lost race.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub requested_by_user_id: String,
    pub authorized_by_user_id: Option<String>,
    pub origin_location_id: Option<Uuid>,
    pub origin_custodian_user_id: Option<String>,
    pub target_location_id: Uuid,
    pub target_custodian_user_id: Option<String>,
    pub status: MovementStatus,
    pub movement_note: Option<String>,
    pub authorization_note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
