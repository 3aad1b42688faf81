use crate::{
    commands::movements::{
        authorize_movement_command::AuthorizeMovementCommand,
        cancel_movement_command::CancelMovementCommand,
        execute_movement_command::ExecuteMovementCommand,
        request_movement_command::RequestMovementCommand,
    },
    commands::Command,
    db::DbPool,
    entities::equipment_movement::{self, MovementStatus},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Service for the movement workflow
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl MovementService {
    /// Creates a new movement service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    /// Requests a movement; auto-executes when no policy demands approval.
    #[instrument(skip(self, command))]
    pub async fn request_movement(
        &self,
        command: RequestMovementCommand,
    ) -> Result<equipment_movement::Model, ServiceError> {
        let movement = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        slog::info!(self.logger, "movement requested";
            "movement_id" => %movement.id,
            "equipment_id" => %movement.equipment_id,
        );
        Ok(movement)
    }

    /// Approves or rejects a pending movement.
    #[instrument(skip(self, command))]
    pub async fn authorize_movement(
        &self,
        command: AuthorizeMovementCommand,
    ) -> Result<equipment_movement::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Executes an approved movement, relocating the asset.
    #[instrument(skip(self, command))]
    pub async fn execute_movement(
        &self,
        command: ExecuteMovementCommand,
    ) -> Result<equipment_movement::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Cancels a pending or approved movement.
    #[instrument(skip(self, command))]
    pub async fn cancel_movement(
        &self,
        command: CancelMovementCommand,
    ) -> Result<equipment_movement::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a movement by ID
    #[instrument(skip(self))]
    pub async fn get_movement(
        &self,
        movement_id: &Uuid,
    ) -> Result<Option<equipment_movement::Model>, ServiceError> {
        equipment_movement::Entity::find_by_id(*movement_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }

    /// Lists movements with pagination, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        status: Option<MovementStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<equipment_movement::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = equipment_movement::Entity::find()
            .order_by_desc(equipment_movement::Column::RequestedAt);
        if let Some(status) = status {
            query = query.filter(equipment_movement::Column::Status.eq(status));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::from)?;
        let movements = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from)?;

        Ok((movements, total))
    }

    /// Pending movements awaiting authorization, oldest first.
    #[instrument(skip(self))]
    pub async fn pending_approvals(
        &self,
    ) -> Result<Vec<equipment_movement::Model>, ServiceError> {
        equipment_movement::Entity::find()
            .filter(equipment_movement::Column::Status.eq(MovementStatus::Pending))
            .order_by_asc(equipment_movement::Column::RequestedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }

    /// Movement history for one asset, newest first.
    #[instrument(skip(self))]
    pub async fn movements_for_equipment(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<equipment_movement::Model>, ServiceError> {
        equipment_movement::Entity::find()
            .filter(equipment_movement::Column::EquipmentId.eq(equipment_id))
            .order_by_desc(equipment_movement::Column::RequestedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }
}
