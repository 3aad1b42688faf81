use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        equipment,
        movement_policy::{self, PolicyScope},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Decides whether one policy row applies to the given asset and requester.
///
/// `role` scope is always consulted; `category` and `location` scopes only
/// apply when the asset actually carries a category/location.
fn policy_matches(
    policy: &movement_policy::Model,
    equipment: &equipment::Model,
    requester_roles: &[String],
) -> bool {
    match policy.scope {
        PolicyScope::Role => policy
            .role
            .as_deref()
            .map(|role| requester_roles.iter().any(|r| r == role))
            .unwrap_or(false),
        PolicyScope::Category => match (&equipment.category, &policy.category) {
            (Some(asset_category), Some(policy_category)) => asset_category == policy_category,
            _ => false,
        },
        PolicyScope::Location => match (equipment.location_id, policy.location_id) {
            (Some(asset_location), Some(policy_location)) => asset_location == policy_location,
            _ => false,
        },
    }
}

/// Most-restrictive-wins evaluation: any matching policy demanding approval
/// decides the outcome, and an asset no policy speaks for requires approval
/// (fail safe).
pub fn approval_required(
    policies: &[movement_policy::Model],
    equipment: &equipment::Model,
    requester_roles: &[String],
) -> bool {
    let mut matched = false;

    for policy in policies {
        if policy_matches(policy, equipment, requester_roles) {
            if policy.requires_approval {
                return true;
            }
            matched = true;
        }
    }

    !matched
}

/// Input for registering a movement policy.
#[derive(Debug, Clone)]
pub struct CreateMovementPolicyInput {
    pub name: String,
    pub scope: PolicyScope,
    pub role: Option<String>,
    pub location_id: Option<Uuid>,
    pub category: Option<String>,
    pub requires_approval: bool,
}

/// Service for managing movement policies and resolving approval rules
#[derive(Clone)]
pub struct MovementPolicyService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MovementPolicyService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Resolves whether moving `equipment` needs explicit authorization for
    /// a requester holding `requester_roles`. Usable inside a transaction.
    #[instrument(skip(self, conn, equipment))]
    pub async fn requires_approval<C: ConnectionTrait>(
        &self,
        conn: &C,
        equipment: &equipment::Model,
        requester_roles: &[String],
    ) -> Result<bool, ServiceError> {
        let policies = movement_policy::Entity::find()
            .all(conn)
            .await
            .map_err(ServiceError::from)?;

        let required = approval_required(&policies, equipment, requester_roles);
        debug!(
            equipment_id = %equipment.id,
            required,
            policy_count = policies.len(),
            "Resolved approval requirement"
        );

        Ok(required)
    }

    /// Registers a policy rule.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_policy(
        &self,
        input: CreateMovementPolicyInput,
    ) -> Result<movement_policy::Model, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Policy name must not be empty".into(),
            ));
        }

        let key_present = match input.scope {
            PolicyScope::Role => input.role.is_some(),
            PolicyScope::Location => input.location_id.is_some(),
            PolicyScope::Category => input.category.is_some(),
        };
        if !key_present {
            return Err(ServiceError::ValidationError(format!(
                "Policy scope {:?} needs its matching key set",
                input.scope
            )));
        }

        let now = Utc::now();
        let policy = movement_policy::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            scope: Set(input.scope),
            role: Set(input.role),
            location_id: Set(input.location_id),
            category: Set(input.category),
            requires_approval: Set(input.requires_approval),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = policy.insert(&*self.db_pool).await.map_err(ServiceError::from)?;

        self.event_sender
            .send(Event::MovementPolicyCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    /// Lists every policy rule, newest first.
    #[instrument(skip(self))]
    pub async fn list_policies(&self) -> Result<Vec<movement_policy::Model>, ServiceError> {
        movement_policy::Entity::find()
            .order_by_desc(movement_policy::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }
}
