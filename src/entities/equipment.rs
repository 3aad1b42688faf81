use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "under_maintenance")]
    UnderMaintenance,
    #[sea_orm(string_value = "retired")]
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum CriticalityTier {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
}

/// An equipment asset. `location_id` and `custodian_user_id` are derived
/// state: the only writer is the movement execute path, which keeps them
/// equal to the target of the most recently completed movement.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub asset_code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub criticality: CriticalityTier,
    pub status: EquipmentStatus,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
    pub owning_group_id: Option<String>,
    pub acquisition_date: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Json", nullable)]
    pub metadata: Option<serde_json::Value>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
