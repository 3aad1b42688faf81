use crate::{
    commands::Command,
    db::DbPool,
    entities::equipment_movement::{self, MovementStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec};
use sea_orm::{EntityTrait, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref MOVEMENT_EXECUTIONS: IntCounter = IntCounter::new(
        "movement_executions_total",
        "Total number of executed movements"
    )
    .expect("metric can be created");
    static ref MOVEMENT_EXECUTION_FAILURES: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "movement_execution_failures_total",
            "Total number of failed movement executions"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ExecuteMovementCommand {
    pub movement_id: Uuid,
    pub executed_by: String,
}

#[async_trait::async_trait]
impl Command for ExecuteMovementCommand {
    type Result = equipment_movement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(movement_id = %self.movement_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();

        let movement = self.execute_in_db(db).await.map_err(|e| {
            match &e {
                ServiceError::StaleOrigin(_) => {
                    MOVEMENT_EXECUTION_FAILURES
                        .with_label_values(&["stale_origin"])
                        .inc();
                    warn!(
                        movement_id = %self.movement_id,
                        "Equipment moved since this movement was requested"
                    );
                }
                ServiceError::InvalidState(_) => {
                    MOVEMENT_EXECUTION_FAILURES
                        .with_label_values(&["invalid_state"])
                        .inc();
                }
                _ => {}
            }
            e
        })?;

        MOVEMENT_EXECUTIONS.inc();

        self.log_and_trigger_event(&event_sender, &movement).await?;

        Ok(movement)
    }
}

impl ExecuteMovementCommand {
    async fn execute_in_db(&self, db: &DbPool) -> Result<equipment_movement::Model, ServiceError> {
        let movement_id = self.movement_id;
        let executed_by = self.executed_by.clone();
        db.transaction::<_, equipment_movement::Model, ServiceError>(move |txn| {
            Box::pin(async move {
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

                if movement.status != MovementStatus::Approved {
                    return Err(ServiceError::InvalidState(format!(
                        "Movement {} is not approved (status {:?})",
                        movement.id, movement.status
                    )));
                }

                super::apply_approved_movement(txn, &movement, &executed_by).await
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
        info!(
            movement_id = %movement.id,
            equipment_id = %movement.equipment_id,
            target_location_id = %movement.target_location_id,
            "Movement executed"
        );

        event_sender
            .send(Event::MovementExecuted {
                movement_id: movement.id,
                equipment_id: movement.equipment_id,
                target_location_id: movement.target_location_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send event for executed movement: {}", e);
                ServiceError::EventError(e)
            })
    }
}
