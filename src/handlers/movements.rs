use crate::{
    commands::movements::{
        authorize_movement_command::AuthorizeMovementCommand,
        cancel_movement_command::CancelMovementCommand,
        execute_movement_command::ExecuteMovementCommand,
        request_movement_command::RequestMovementCommand,
    },
    entities::{
        equipment,
        equipment_movement::{self, MovementStatus},
    },
    errors::ServiceError,
    handlers::common::ActingUser,
    services::authorization::Permissions,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestMovementRequest {
    pub equipment_id: Uuid,
    pub target_location_id: Uuid,
    pub target_custodian_user_id: Option<String>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorizeMovementRequest {
    /// true approves, false rejects
    pub approve: bool,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelMovementRequest {
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct MovementListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// Optional status filter
    pub status: Option<MovementStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementSummary {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub status: MovementStatus,
    pub origin_location_id: Option<Uuid>,
    pub target_location_id: Uuid,
    pub target_custodian_user_id: Option<String>,
    pub requested_by_user_id: String,
    pub authorized_by_user_id: Option<String>,
    pub movement_note: Option<String>,
    pub authorization_note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl From<equipment_movement::Model> for MovementSummary {
    fn from(model: equipment_movement::Model) -> Self {
        Self {
            id: model.id,
            equipment_id: model.equipment_id,
            status: model.status,
            origin_location_id: model.origin_location_id,
            target_location_id: model.target_location_id,
            target_custodian_user_id: model.target_custodian_user_id,
            requested_by_user_id: model.requested_by_user_id,
            authorized_by_user_id: model.authorized_by_user_id,
            movement_note: model.movement_note,
            authorization_note: model.authorization_note,
            requested_at: model.requested_at,
            authorized_at: model.authorized_at,
            executed_at: model.executed_at,
        }
    }
}

/// Loads the movement plus the asset it belongs to, for permission checks.
async fn movement_with_equipment(
    state: &AppState,
    movement_id: Uuid,
) -> Result<(equipment_movement::Model, equipment::Model), ServiceError> {
    let movement = state
        .services
        .movements
        .get_movement(&movement_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Movement {} not found", movement_id)))?;

    let equipment = equipment::Entity::find_by_id(movement.equipment_id)
        .one(&*state.db)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Equipment {} not found", movement.equipment_id))
        })?;

    Ok((movement, equipment))
}

pub async fn request_movement(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(payload): Json<RequestMovementRequest>,
) -> ApiResult<MovementSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let asset = state
        .services
        .equipment
        .get_equipment(&payload.equipment_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Equipment {} not found", payload.equipment_id))
        })?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_view_equipment(&asset) {
        return Err(ServiceError::Forbidden(
            "You do not have access to this equipment".into(),
        ));
    }

    let requester_roles = state
        .services
        .authorization
        .requester_roles(actor.id())
        .await?;

    let command = RequestMovementCommand {
        equipment_id: payload.equipment_id,
        target_location_id: payload.target_location_id,
        target_custodian_user_id: payload.target_custodian_user_id,
        note: payload.note,
        requested_by: actor.id().to_string(),
        requester_roles,
    };

    let movement = state.services.movements.request_movement(command).await?;
    Ok(Json(ApiResponse::success(MovementSummary::from(movement))))
}

pub async fn authorize_movement(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AuthorizeMovementRequest>,
) -> ApiResult<MovementSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let (_, asset) = movement_with_equipment(&state, id).await?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_authorize_movement(&asset) {
        return Err(ServiceError::Forbidden(
            "Authorizing movements needs admin access to the equipment".into(),
        ));
    }

    let command = AuthorizeMovementCommand {
        movement_id: id,
        approve: payload.approve,
        note: payload.note,
        authorized_by: actor.id().to_string(),
    };

    let movement = state.services.movements.authorize_movement(command).await?;
    Ok(Json(ApiResponse::success(MovementSummary::from(movement))))
}

pub async fn execute_movement(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<MovementSummary> {
    let (_, asset) = movement_with_equipment(&state, id).await?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_administer_equipment(&asset) {
        return Err(ServiceError::Forbidden(
            "Executing movements needs admin access to the equipment".into(),
        ));
    }

    let command = ExecuteMovementCommand {
        movement_id: id,
        executed_by: actor.id().to_string(),
    };

    let movement = state.services.movements.execute_movement(command).await?;
    Ok(Json(ApiResponse::success(MovementSummary::from(movement))))
}

pub async fn cancel_movement(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelMovementRequest>,
) -> ApiResult<MovementSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let (movement, asset) = movement_with_equipment(&state, id).await?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_cancel_movement(actor.id(), &movement, &asset) {
        return Err(ServiceError::Forbidden(
            "Only the requester or an administrator may cancel a movement".into(),
        ));
    }

    let command = CancelMovementCommand {
        movement_id: id,
        note: payload.note,
        cancelled_by: actor.id().to_string(),
    };

    let movement = state.services.movements.cancel_movement(command).await?;
    Ok(Json(ApiResponse::success(MovementSummary::from(movement))))
}

pub async fn get_movement(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<MovementSummary> {
    let (movement, asset) = movement_with_equipment(&state, id).await?;

    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.can_view_equipment(&asset) {
        return Err(ServiceError::NotFound(format!("Movement {} not found", id)));
    }

    Ok(Json(ApiResponse::success(MovementSummary::from(movement))))
}

/// Drops movements whose equipment the caller may not see.
async fn retain_visible(
    state: &AppState,
    permissions: &Permissions,
    movements: Vec<equipment_movement::Model>,
    admin_level: bool,
) -> Result<Vec<equipment_movement::Model>, ServiceError> {
    if movements.is_empty() {
        return Ok(movements);
    }

    let equipment_ids: Vec<Uuid> = movements.iter().map(|m| m.equipment_id).collect();
    let assets = equipment::Entity::find()
        .filter(equipment::Column::Id.is_in(equipment_ids))
        .all(&*state.db)
        .await
        .map_err(ServiceError::from)?;

    Ok(movements
        .into_iter()
        .filter(|movement| {
            assets
                .iter()
                .find(|asset| asset.id == movement.equipment_id)
                .map(|asset| {
                    if admin_level {
                        permissions.can_administer_equipment(asset)
                    } else {
                        permissions.can_view_equipment(asset)
                    }
                })
                .unwrap_or(false)
        })
        .collect())
}

pub async fn list_movements(
    State(state): State<AppState>,
    actor: ActingUser,
    Query(query): Query<MovementListQuery>,
) -> ApiResult<PaginatedResponse<MovementSummary>> {
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

    let (movements, total) = state
        .services
        .movements
        .list_movements(query.status, page, limit)
        .await?;

    let visible = retain_visible(&state, &permissions, movements, false).await?;
    let items: Vec<MovementSummary> = visible.into_iter().map(MovementSummary::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn pending_approvals(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<Vec<MovementSummary>> {
    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;

    let pending = state.services.movements.pending_approvals().await?;
    let actionable = retain_visible(&state, &permissions, pending, true).await?;

    Ok(Json(ApiResponse::success(
        actionable.into_iter().map(MovementSummary::from).collect(),
    )))
}
