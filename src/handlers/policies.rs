use crate::{
    entities::movement_policy::{self, PolicyScope},
    errors::ServiceError,
    handlers::common::ActingUser,
    services::policies::CreateMovementPolicyInput,
    ApiResponse, ApiResult, AppState,
};
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePolicyRequest {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: String,
    pub scope: PolicyScope,
    pub role: Option<String>,
    pub location_id: Option<Uuid>,
    pub category: Option<String>,
    pub requires_approval: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicySummary {
    pub id: Uuid,
    pub name: String,
    pub scope: PolicyScope,
    pub role: Option<String>,
    pub location_id: Option<Uuid>,
    pub category: Option<String>,
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
}

impl From<movement_policy::Model> for PolicySummary {
    fn from(model: movement_policy::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            scope: model.scope,
            role: model.role,
            location_id: model.location_id,
            category: model.category,
            requires_approval: model.requires_approval,
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
            "Managing movement policies needs global admin rights".into(),
        ));
    }
    Ok(())
}

pub async fn create_policy(
    State(state): State<AppState>,
    actor: ActingUser,
    Json(payload): Json<CreatePolicyRequest>,
) -> ApiResult<PolicySummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    require_global_admin(&state, &actor).await?;

    let input = CreateMovementPolicyInput {
        name: payload.name,
        scope: payload.scope,
        role: payload.role,
        location_id: payload.location_id,
        category: payload.category,
        requires_approval: payload.requires_approval,
    };

    let created = state.services.policies.create_policy(input).await?;
    Ok(Json(ApiResponse::success(PolicySummary::from(created))))
}

pub async fn list_policies(
    State(state): State<AppState>,
    actor: ActingUser,
) -> ApiResult<Vec<PolicySummary>> {
    require_global_admin(&state, &actor).await?;

    let policies = state.services.policies.list_policies().await?;
    Ok(Json(ApiResponse::success(
        policies.into_iter().map(PolicySummary::from).collect(),
    )))
}
