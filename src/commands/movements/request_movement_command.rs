use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        equipment, location,
        equipment_movement::{self, MovementStatus},
        movement_policy,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::{self, MovementAction},
    services::policies::approval_required,
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref MOVEMENT_REQUESTS: IntCounter = IntCounter::new(
        "movement_requests_total",
        "Total number of movement requests"
    )
    .expect("metric can be created");
    static ref MOVEMENT_AUTO_EXECUTIONS: IntCounter = IntCounter::new(
        "movement_auto_executions_total",
        "Total number of movements executed without explicit approval"
    )
    .expect("metric can be created");
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestMovementCommand {
    pub equipment_id: Uuid,
    pub target_location_id: Uuid,
    pub target_custodian_user_id: Option<String>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    pub requested_by: String,
    /// Role names the policy resolver matches against; supplied by the
    /// authorization gate.
    pub requester_roles: Vec<String>,
}

#[async_trait::async_trait]
impl Command for RequestMovementCommand {
    type Result = equipment_movement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(equipment_id = %self.equipment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = db_pool.as_ref();
        let movement = self.request_in_db(db).await?;

        MOVEMENT_REQUESTS.inc();
        if movement.status == MovementStatus::Completed {
            MOVEMENT_AUTO_EXECUTIONS.inc();
        }

        self.log_and_trigger_events(&event_sender, &movement).await?;

        Ok(movement)
    }
}

impl RequestMovementCommand {
    async fn request_in_db(
        &self,
        db: &DbPool,
    ) -> Result<equipment_movement::Model, ServiceError> {
        let equipment_id = self.equipment_id;
        let target_location_id = self.target_location_id;
        let target_custodian_user_id = self.target_custodian_user_id.clone();
        let note = self.note.clone();
        let requested_by = self.requested_by.clone();
        let requester_roles = self.requester_roles.clone();
        db.transaction::<_, equipment_movement::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let asset = equipment::Entity::find_by_id(equipment_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::from)?
                    .filter(|e| e.deleted_at.is_none())
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Equipment {} not found",
                            equipment_id
                        ))
                    })?;

                let target = location::Entity::find_by_id(target_location_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::from)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Location {} not found",
                            target_location_id
                        ))
                    })?;

                if !target.is_active {
                    return Err(ServiceError::InvalidTarget(format!(
                        "Location {} is inactive",
                        target.id
                    )));
                }

                if asset.location_id == Some(target_location_id) {
                    return Err(ServiceError::InvalidTarget(
                        "Target equals the asset's current location".into(),
                    ));
                }

                let policies = movement_policy::Entity::find()
                    .all(txn)
                    .await
                    .map_err(ServiceError::from)?;
                let needs_approval =
                    approval_required(&policies, &asset, &requester_roles);

                let now = Utc::now();
                let movement = equipment_movement::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    equipment_id: Set(asset.id),
                    requested_by_user_id: Set(requested_by.clone()),
                    authorized_by_user_id: Set(None),
                    origin_location_id: Set(asset.location_id),
                    origin_custodian_user_id: Set(asset.custodian_user_id.clone()),
                    target_location_id: Set(target_location_id),
                    target_custodian_user_id: Set(target_custodian_user_id.clone()),
                    status: Set(MovementStatus::Pending),
                    movement_note: Set(note.clone()),
                    authorization_note: Set(None),
                    requested_at: Set(now),
                    authorized_at: Set(None),
                    executed_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(ServiceError::from)?;

                audit::record_movement_event(
                    txn,
                    asset.id,
                    movement.id,
                    MovementAction::Requested,
                    json!({
                        "origin_location_id": movement.origin_location_id,
                        "target_location_id": movement.target_location_id,
                        "target_custodian_user_id": movement.target_custodian_user_id.clone(),
                        "note": movement.movement_note.clone(),
                    }),
                    Some(requested_by.clone()),
                )
                .await
                .map_err(ServiceError::from)?;

                if needs_approval {
                    return Ok(movement);
                }

                // No policy demands approval: approve and execute in the
                // same transaction. The guarded flip keeps the transition
                // discipline even though the row was just inserted.
                let approved_rows = equipment_movement::Entity::update_many()
                    .col_expr(
                        equipment_movement::Column::Status,
                        Expr::value(MovementStatus::Approved),
                    )
                    .col_expr(
                        equipment_movement::Column::AuthorizedAt,
                        Expr::value(Some(now)),
                    )
                    .col_expr(equipment_movement::Column::UpdatedAt, Expr::value(now))
                    .filter(equipment_movement::Column::Id.eq(movement.id))
                    .filter(equipment_movement::Column::Status.eq(MovementStatus::Pending))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::from)?;
                if approved_rows.rows_affected == 0 {
                    return Err(ServiceError::InvalidState(format!(
                        "Movement {} is not pending",
                        movement.id
                    )));
                }

                let approved = equipment_movement::Model {
                    status: MovementStatus::Approved,
                    authorized_at: Some(now),
                    ..movement
                };

                super::apply_approved_movement(txn, &approved, &requested_by).await
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    async fn log_and_trigger_events(
        &self,
        event_sender: &EventSender,
        movement: &equipment_movement::Model,
    ) -> Result<(), ServiceError> {
        info!(
            movement_id = %movement.id,
            equipment_id = %movement.equipment_id,
            status = ?movement.status,
            "Movement requested"
        );

        event_sender
            .send(Event::MovementRequested(movement.id))
            .await
            .map_err(|e| {
                error!("Failed to send event for requested movement: {}", e);
                ServiceError::EventError(e)
            })?;

        if movement.status == MovementStatus::Completed {
            event_sender
                .send(Event::MovementExecuted {
                    movement_id: movement.id,
                    equipment_id: movement.equipment_id,
                    target_location_id: movement.target_location_id,
                })
                .await
                .map_err(|e| {
                    error!("Failed to send event for auto-executed movement: {}", e);
                    ServiceError::EventError(e)
                })?;
        }

        Ok(())
    }
}
