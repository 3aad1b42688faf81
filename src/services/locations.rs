use crate::{
    db::DbPool,
    entities::location::{self, LocationType},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Input for creating a location node.
#[derive(Debug, Clone)]
pub struct CreateLocationInput {
    pub name: String,
    pub location_type: LocationType,
    pub parent_id: Option<Uuid>,
    pub timezone: Option<String>,
}

/// Service for the location tree
#[derive(Clone)]
pub struct LocationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl LocationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a location under an optional parent.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_location(
        &self,
        input: CreateLocationInput,
    ) -> Result<location::Model, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Location name must not be empty".into(),
            ));
        }

        let db = &*self.db_pool;

        if let Some(parent_id) = input.parent_id {
            location::Entity::find_by_id(parent_id)
                .one(db)
                .await
                .map_err(ServiceError::from)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Parent location {} not found", parent_id))
                })?;
        }

        let now = Utc::now();
        let created = location::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            location_type: Set(input.location_type),
            parent_id: Set(input.parent_id),
            timezone: Set(input.timezone),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::from)?;

        self.event_sender
            .send(Event::LocationCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    /// Re-parents a location, rejecting any assignment that would close a
    /// cycle in the tree.
    #[instrument(skip(self))]
    pub async fn set_parent(
        &self,
        location_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<location::Model, ServiceError> {
        let db = &*self.db_pool;

        let node = location::Entity::find_by_id(location_id)
            .one(db)
            .await
            .map_err(ServiceError::from)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Location {} not found", location_id))
            })?;

        if let Some(parent_id) = new_parent_id {
            if parent_id == location_id {
                return Err(ServiceError::ValidationError(
                    "A location cannot be its own parent".into(),
                ));
            }
            if self.chain_contains(parent_id, location_id).await? {
                return Err(ServiceError::ValidationError(
                    "Parent assignment would create a cycle in the location tree".into(),
                ));
            }
        }

        let mut active: location::ActiveModel = node.into();
        active.parent_id = Set(new_parent_id);
        active.updated_at = Set(Utc::now());
        active.update(db).await.map_err(ServiceError::from)
    }

    /// Walks the parent chain upward from `start` looking for `needle`.
    async fn chain_contains(&self, start: Uuid, needle: Uuid) -> Result<bool, ServiceError> {
        let db = &*self.db_pool;
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut cursor = Some(start);

        while let Some(current) = cursor {
            if current == needle {
                return Ok(true);
            }
            if !visited.insert(current) {
                // Pre-existing cycle; stop walking rather than spin.
                return Ok(true);
            }
            cursor = location::Entity::find_by_id(current)
                .one(db)
                .await
                .map_err(ServiceError::from)?
                .and_then(|node| node.parent_id);
        }

        Ok(false)
    }

    /// Marks a location inactive; it stops being a valid movement target.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, location_id: Uuid) -> Result<location::Model, ServiceError> {
        let db = &*self.db_pool;

        let node = location::Entity::find_by_id(location_id)
            .one(db)
            .await
            .map_err(ServiceError::from)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Location {} not found", location_id))
            })?;

        let mut active: location::ActiveModel = node.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::from)?;

        self.event_sender
            .send(Event::LocationDeactivated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Gets a location by ID
    #[instrument(skip(self))]
    pub async fn get_location(
        &self,
        location_id: &Uuid,
    ) -> Result<Option<location::Model>, ServiceError> {
        location::Entity::find_by_id(*location_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }

    /// Lists active locations ordered by name.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<location::Model>, ServiceError> {
        location::Entity::find()
            .filter(location::Column::IsActive.eq(true))
            .order_by_asc(location::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }
}
