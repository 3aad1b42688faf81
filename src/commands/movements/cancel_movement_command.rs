use crate::{
    commands::Command,
    db::DbPool,
    entities::equipment_movement::{self, MovementStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::{self, MovementAction},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CancelMovementCommand {
    pub movement_id: Uuid,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    pub cancelled_by: String,
}

#[async_trait::async_trait]
impl Command for CancelMovementCommand {
    type Result = equipment_movement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(movement_id = %self.movement_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = db_pool.as_ref();
        let movement = self.cancel_in_db(db).await?;

        self.log_and_trigger_event(&event_sender, &movement).await?;

        Ok(movement)
    }
}

impl CancelMovementCommand {
    async fn cancel_in_db(&self, db: &DbPool) -> Result<equipment_movement::Model, ServiceError> {
        let movement_id = self.movement_id;
        let note = self.note.clone();
        let cancelled_by = self.cancelled_by.clone();
        db.transaction::<_, equipment_movement::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let now = Utc::now();

                // Cancellation never touches the equipment row: an approved
                // movement has not moved the asset yet, only execute does.
                let result = equipment_movement::Entity::update_many()
                    .col_expr(
                        equipment_movement::Column::Status,
                        Expr::value(MovementStatus::Cancelled),
                    )
                    .col_expr(equipment_movement::Column::UpdatedAt, Expr::value(now))
                    .filter(equipment_movement::Column::Id.eq(movement_id))
                    .filter(equipment_movement::Column::Status.is_in([
                        MovementStatus::Pending,
                        MovementStatus::Approved,
                    ]))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::from)?;

                if result.rows_affected == 0 {
                    let current = equipment_movement::Entity::find_by_id(movement_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::from)?;
                    return match current {
                        None => Err(ServiceError::NotFound(format!(
                            "Movement {} not found",
                            movement_id
                        ))),
                        Some(m) => Err(ServiceError::InvalidState(format!(
                            "Movement {} is already terminal (status {:?})",
                            m.id, m.status
                        ))),
                    };
                }

                let movement = equipment_movement::Entity::find_by_id(movement_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::from)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Movement {} not found",
                            movement_id
                        ))
                    })?;

                audit::record_movement_event(
                    txn,
                    movement.equipment_id,
                    movement.id,
                    MovementAction::Cancelled,
                    json!({ "note": note.clone() }),
                    Some(cancelled_by.clone()),
                )
                .await
                .map_err(ServiceError::from)?;

                Ok(movement)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        movement: &equipment_movement::Model,
    ) -> Result<(), ServiceError> {
        info!(movement_id = %movement.id, "Movement cancelled");

        event_sender
            .send(Event::MovementCancelled(movement.id))
            .await
            .map_err(|e| {
                error!("Failed to send event for cancelled movement: {}", e);
                ServiceError::EventError(e)
            })
    }
}
