use crate::{
    entities::location::{self, LocationType},
    errors::ServiceError,
    handlers::common::ActingUser,
    services::locations::CreateLocationInput,
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
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: String,
    pub location_type: Option<LocationType>,
    pub parent_id: Option<Uuid>,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetParentRequest {
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
    pub location_type: LocationType,
    pub parent_id: Option<Uuid>,
    pub timezone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<location::Model> for LocationSummary {
    fn from(model: location::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            location_type: model.location_type,
            parent_id: model.parent_id,
            timezone: model.timezone,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

async fn require_global_admin(state: &AppState, actor: &ActingUser) -> Result<(), ServiceError> {
    let permissions = state
        .services
        .authorization
        .effective_permissions(actor.id())
        .await?;
    if !permissions.is_global_admin {
        return Err(ServiceError::Forbidden(
            "Managing locations needs global admin rights".into(),
        ));
    }
    Ok(())
}

pub async fn create_location(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(payload): Json<CreateLocationRequest>,
) -> ApiResult<LocationSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    require_global_admin(&state, &actor).await?;

    let input = CreateLocationInput {
        name: payload.name,
        location_type: payload.location_type.unwrap_or(LocationType::Room),
        parent_id: payload.parent_id,
        timezone: payload.timezone,
    };

    let created = state.services.locations.create_location(input).await?;
    Ok(Json(ApiResponse::success(LocationSummary::from(created))))
}

pub async fn set_location_parent(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetParentRequest>,
) -> ApiResult<LocationSummary> {
    require_global_admin(&state, &actor).await?;

    let updated = state
        .services
        .locations
        .set_parent(id, payload.parent_id)
        .await?;
    Ok(Json(ApiResponse::success(LocationSummary::from(updated))))
}

pub async fn deactivate_location(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<LocationSummary> {
    require_global_admin(&state, &actor).await?;

    let updated = state.services.locations.deactivate(id).await?;
    Ok(Json(ApiResponse::success(LocationSummary::from(updated))))
}

pub async fn get_location(
    State(state): State<AppState>,
    _actor: ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<LocationSummary> {
    match state.services.locations.get_location(&id).await? {
        Some(model) => Ok(Json(ApiResponse::success(LocationSummary::from(model)))),
        None => Err(ServiceError::NotFound(format!("Location {} not found", id))),
    }
}

pub async fn list_locations(
    State(state): State<AppState>,
    _actor: ActingUser,
) -> ApiResult<Vec<LocationSummary>> {
    let locations = state.services.locations.list_active().await?;
    Ok(Json(ApiResponse::success(
        locations.into_iter().map(LocationSummary::from).collect(),
    )))
}
