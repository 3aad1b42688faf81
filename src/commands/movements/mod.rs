pub mod authorize_movement_command;
pub mod cancel_movement_command;
pub mod execute_movement_command;
pub mod request_movement_command;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter,
};
use serde_json::json;

use crate::{
    entities::{
        equipment,
        equipment_movement::{self, MovementStatus},
    },
    errors::ServiceError,
    services::audit::{self, MovementAction},
};

/// Applies the effects of an approved movement inside the caller's
/// transaction: the equipment compare-and-set, the guarded status flip to
/// `completed`, and the `completed` audit entry. Shared by the execute
/// command and the auto-execute branch of the request command so the asset
/// row has exactly one writer.
pub(crate) async fn apply_approved_movement(
    txn: &DatabaseTransaction,
    movement: &equipment_movement::Model,
    actor_user_id: &str,
) -> Result<equipment_movement::Model, ServiceError> {
    let now = Utc::now();

    // Compare-and-set: the asset must still sit at the movement's origin
    // snapshot. A concurrent completed movement leaves zero matching rows.
    let mut cas = equipment::Entity::update_many()
        .col_expr(
            equipment::Column::LocationId,
            Expr::value(movement.target_location_id),
        )
        .col_expr(
            equipment::Column::CustodianUserId,
            Expr::value(movement.target_custodian_user_id.clone()),
        )
        .col_expr(equipment::Column::UpdatedAt, Expr::value(now))
        .filter(equipment::Column::Id.eq(movement.equipment_id));
    cas = match movement.origin_location_id {
        Some(origin) => cas.filter(equipment::Column::LocationId.eq(origin)),
        None => cas.filter(equipment::Column::LocationId.is_null()),
    };

    let cas_result = cas.exec(txn).await.map_err(ServiceError::from)?;
    if cas_result.rows_affected == 0 {
        return Err(ServiceError::StaleOrigin(movement.id));
    }

    // Guarded flip: only an approved movement may complete.
    let flip = equipment_movement::Entity::update_many()
        .col_expr(
            equipment_movement::Column::Status,
            Expr::value(MovementStatus::Completed),
        )
        .col_expr(equipment_movement::Column::ExecutedAt, Expr::value(Some(now)))
        .col_expr(equipment_movement::Column::UpdatedAt, Expr::value(now))
        .filter(equipment_movement::Column::Id.eq(movement.id))
        .filter(equipment_movement::Column::Status.eq(MovementStatus::Approved))
        .exec(txn)
        .await
        .map_err(ServiceError::from)?;
    if flip.rows_affected == 0 {
        return Err(ServiceError::InvalidState(format!(
            "Movement {} is not approved",
            movement.id
        )));
    }

    audit::record_movement_event(
        txn,
        movement.equipment_id,
        movement.id,
        MovementAction::Completed,
        json!({
            "origin_location_id": movement.origin_location_id,
            "target_location_id": movement.target_location_id,
            "target_custodian_user_id": movement.target_custodian_user_id.clone(),
        }),
        Some(actor_user_id.to_string()),
    )
    .await
    .map_err(ServiceError::from)?;

    equipment_movement::Entity::find_by_id(movement.id)
        .one(txn)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::NotFound(format!("Movement {} not found", movement.id)))
}
