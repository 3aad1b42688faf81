use crate::{
    entities::equipment_maintenance::{self, MaintenanceType},
    errors::ServiceError,
    handlers::common::ActingUser,
    services::maintenance::OpenMaintenanceInput,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OpenMaintenanceRequest {
    pub equipment_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub technician_user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteMaintenanceRequest {
    #[validate(length(max = 1000, message = "Result note must be at most 1000 characters"))]
    pub result_note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaintenanceSummary {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub technician_user_id: Option<String>,
    pub result_note: Option<String>,
}

impl From<equipment_maintenance::Model> for MaintenanceSummary {
    fn from(model: equipment_maintenance::Model) -> Self {
        Self {
            id: model.id,
            equipment_id: model.equipment_id,
            maintenance_type: model.maintenance_type,
            scheduled_for: model.scheduled_for,
            started_at: model.started_at,
            completed_at: model.completed_at,
            technician_user_id: model.technician_user_id,
            result_note: model.result_note,
        }
    }
}

async fn require_admin_on_equipment(
    state: &AppState,
    actor: &ActingUser,
    equipment_id: Uuid,
) -> Result<(), ServiceError> {
    let asset = state
        .services
        .equipment
        .get_equipment(&equipment_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Equipment {} not found", equipment_id)))?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_administer_equipment(&asset) {
        return Err(ServiceError::Forbidden(
            "Maintenance actions need admin access to the equipment".into(),
        ));
    }
    Ok(())
}

pub async fn open_maintenance(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(payload): Json<OpenMaintenanceRequest>,
) -> ApiResult<MaintenanceSummary> {
    require_admin_on_equipment(&state, &actor, payload.equipment_id).await?;

    let input = OpenMaintenanceInput {
        equipment_id: payload.equipment_id,
        maintenance_type: payload.maintenance_type,
        scheduled_for: payload.scheduled_for,
        technician_user_id: payload.technician_user_id,
    };

    let record = state
        .services
        .maintenance
        .open_maintenance(input, actor.id())
        .await?;
    Ok(Json(ApiResponse::success(MaintenanceSummary::from(record))))
}

pub async fn complete_maintenance(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteMaintenanceRequest>,
) -> ApiResult<MaintenanceSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let record = state
        .services
        .maintenance
        .history_entry(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Maintenance record {} not found", id)))?;
    require_admin_on_equipment(&state, &actor, record.equipment_id).await?;

    let record = state
        .services
        .maintenance
        .complete_maintenance(id, payload.result_note, actor.id())
        .await?;
    Ok(Json(ApiResponse::success(MaintenanceSummary::from(record))))
}

pub async fn maintenance_history(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(equipment_id): Path<Uuid>,
) -> ApiResult<Vec<MaintenanceSummary>> {
    let asset = state
        .services
        .equipment
        .get_equipment(&equipment_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Equipment {} not found", equipment_id)))?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_view_equipment(&asset) {
        return Err(ServiceError::NotFound(format!(
            "Equipment {} not found",
            equipment_id
        )));
    }

    let records = state.services.maintenance.history(equipment_id).await?;
    Ok(Json(ApiResponse::success(
        records.into_iter().map(MaintenanceSummary::from).collect(),
    )))
}
