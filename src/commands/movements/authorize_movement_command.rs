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
pub struct AuthorizeMovementCommand {
    pub movement_id: Uuid,
    /// true approves, false rejects; rejection is terminal.
    pub approve: bool,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    pub authorized_by: String,
}

#[async_trait::async_trait]
impl Command for AuthorizeMovementCommand {
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
        let movement = self.authorize_in_db(db).await?;

        self.log_and_trigger_event(&event_sender, &movement).await?;

        Ok(movement)
    }
}

impl AuthorizeMovementCommand {
    async fn authorize_in_db(
        &self,
        db: &DbPool,
    ) -> Result<equipment_movement::Model, ServiceError> {
        let approve = self.approve;
        let authorized_by = self.authorized_by.clone();
        let movement_id = self.movement_id;
        let note = self.note.clone();
        db.transaction::<_, equipment_movement::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let now = Utc::now();
                let next_status = if approve {
                    MovementStatus::Approved
                } else {
                    MovementStatus::Rejected
                };

                // Guarded transition: only a pending movement may be decided.
                let mut update = equipment_movement::Entity::update_many()
                    .col_expr(
                        equipment_movement::Column::Status,
                        Expr::value(next_status.clone()),
                    )
                    .col_expr(
                        equipment_movement::Column::AuthorizedByUserId,
                        Expr::value(Some(authorized_by.clone())),
                    )
                    .col_expr(
                        equipment_movement::Column::AuthorizedAt,
                        Expr::value(Some(now)),
                    )
                    .col_expr(equipment_movement::Column::UpdatedAt, Expr::value(now))
                    .filter(equipment_movement::Column::Id.eq(movement_id))
                    .filter(equipment_movement::Column::Status.eq(MovementStatus::Pending));
                if let Some(note) = &note {
                    update = update.col_expr(
                        equipment_movement::Column::AuthorizationNote,
                        Expr::value(Some(note.clone())),
                    );
                }

                let result = update.exec(txn).await.map_err(ServiceError::from)?;
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
                            "Movement {} is not pending (status {:?})",
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

                let action = if approve {
                    MovementAction::Approved
                } else {
                    MovementAction::Rejected
                };
                audit::record_movement_event(
                    txn,
                    movement.equipment_id,
                    movement.id,
                    action,
                    json!({ "note": note.clone() }),
                    Some(authorized_by.clone()),
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
        let event = if self.approve {
            info!(movement_id = %movement.id, "Movement approved");
            Event::MovementApproved(movement.id)
        } else {
            info!(movement_id = %movement.id, "Movement rejected");
            Event::MovementRejected(movement.id)
        };

        event_sender.send(event).await.map_err(|e| {
            error!("Failed to send event for authorized movement: {}", e);
            ServiceError::EventError(e)
        })
    }
}
