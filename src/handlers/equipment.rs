use crate::{
    entities::{
        equipment::{self, CriticalityTier, EquipmentStatus},
        equipment_audit_log::{self, AuditEvent},
    },
    errors::ServiceError,
    handlers::common::ActingUser,
    services::equipment::{EquipmentFilters, RegisterEquipmentInput, UpdateEquipmentInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterEquipmentRequest {
    #[validate(length(min = 1, max = 64, message = "Asset code must be 1-64 characters"))]
    pub asset_code: String,
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub criticality: Option<CriticalityTier>,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
    pub owning_group_id: Option<String>,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub criticality: Option<CriticalityTier>,
    pub owning_group_id: Option<Option<String>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    pub status: EquipmentStatus,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct EquipmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<EquipmentStatus>,
    pub category: Option<String>,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct AuditLogQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EquipmentSummary {
    pub id: Uuid,
    pub asset_code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub criticality: CriticalityTier,
    pub status: EquipmentStatus,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
    pub owning_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<equipment::Model> for EquipmentSummary {
    fn from(model: equipment::Model) -> Self {
        Self {
            id: model.id,
            asset_code: model.asset_code,
            name: model.name,
            description: model.description,
            category: model.category,
            criticality: model.criticality,
            status: model.status,
            location_id: model.location_id,
            custodian_user_id: model.custodian_user_id,
            owning_group_id: model.owning_group_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogEntrySummary {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub event_type: AuditEvent,
    pub payload: Option<serde_json::Value>,
    pub actor_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<equipment_audit_log::Model> for AuditLogEntrySummary {
    fn from(model: equipment_audit_log::Model) -> Self {
        Self {
            id: model.id,
            equipment_id: model.equipment_id,
            event_type: model.event_type,
            payload: model.payload,
            actor_user_id: model.actor_user_id,
            created_at: model.created_at,
        }
    }
}

pub async fn register_equipment(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(payload): Json<RegisterEquipmentRequest>,
) -> ApiResult<EquipmentSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    // Registering into a group is an admin action on that group.
    if let Some(group_id) = &payload.owning_group_id {
        let permissions = state
            .services
            .authorization
            .effective_permissions(actor.id())
            .await?;
        if !permissions.is_global_admin && !permissions.admin_group_ids.contains(group_id) {
            return Err(ServiceError::Forbidden(format!(
                "Registering equipment into group {} needs admin rights",
                group_id
            )));
        }
    }

    let input = RegisterEquipmentInput {
        asset_code: payload.asset_code,
        name: payload.name,
        description: payload.description,
        category: payload.category,
        criticality: payload.criticality.unwrap_or(CriticalityTier::Medium),
        location_id: payload.location_id,
        custodian_user_id: payload.custodian_user_id,
        owning_group_id: payload.owning_group_id,
        acquisition_date: payload.acquisition_date,
        metadata: payload.metadata,
    };

    let asset = state
        .services
        .equipment
        .register_equipment(input, actor.id())
        .await?;
    Ok(Json(ApiResponse::success(EquipmentSummary::from(asset))))
}

async fn require_admin_on(
    state: &AppState,
    actor: &ActingUser,
    equipment_id: Uuid,
) -> Result<equipment::Model, ServiceError> {
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
            "This action needs admin access to the equipment".into(),
        ));
    }

    Ok(asset)
}

pub async fn update_equipment(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEquipmentRequest>,
) -> ApiResult<EquipmentSummary> {
    require_admin_on(&state, &actor, id).await?;

    let input = UpdateEquipmentInput {
        name: payload.name,
        description: payload.description,
        category: payload.category,
        criticality: payload.criticality,
        owning_group_id: payload.owning_group_id,
        metadata: payload.metadata,
    };

    let asset = state
        .services
        .equipment
        .update_equipment(id, input, actor.id())
        .await?;
    Ok(Json(ApiResponse::success(EquipmentSummary::from(asset))))
}

pub async fn change_equipment_status(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> ApiResult<EquipmentSummary> {
    require_admin_on(&state, &actor, id).await?;

    let asset = state
        .services
        .equipment
        .change_status(id, payload.status, actor.id())
        .await?;
    Ok(Json(ApiResponse::success(EquipmentSummary::from(asset))))
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_admin_on(&state, &actor, id).await?;

    state.services.equipment.soft_delete(id, actor.id()).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "equipment_id": id, "deleted": true }),
    )))
}

pub async fn get_equipment(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<EquipmentSummary> {
    let asset = state
        .services
        .equipment
        .get_equipment(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Equipment {} not found", id)))?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_view_equipment(&asset) {
        return Err(ServiceError::NotFound(format!("Equipment {} not found", id)));
    }

    Ok(Json(ApiResponse::success(EquipmentSummary::from(asset))))
}

pub async fn list_equipment(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<EquipmentListQuery>,
) -> ApiResult<PaginatedResponse<EquipmentSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;

    let filters = EquipmentFilters {
        status: query.status,
        category: query.category,
        location_id: query.location_id,
        custodian_user_id: query.custodian_user_id,
    };

    let (assets, total) = state
        .services
        .equipment
        .list_equipment(filters, page, limit)
        .await?;

    let items: Vec<EquipmentSummary> = assets
        .into_iter()
        .filter(|asset| permissions.can_view_equipment(asset))
        .map(EquipmentSummary::from)
        .collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn equipment_audit_log(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<PaginatedResponse<AuditLogEntrySummary>> {
    let asset = state
        .services
        .equipment
        .get_equipment(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Equipment {} not found", id)))?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_view_equipment(&asset) {
        return Err(ServiceError::NotFound(format!("Equipment {} not found", id)));
    }

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);

    let (entries, total) = state.services.audit.history(id, page, limit).await?;
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: entries.into_iter().map(AuditLogEntrySummary::from).collect(),
        total,
        page,
        limit,
        total_pages,
    })))
}
