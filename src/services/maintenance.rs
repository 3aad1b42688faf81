use crate::{
    db::DbPool,
    entities::{
        equipment::{self, EquipmentStatus},
        equipment_audit_log::AuditEvent,
        equipment_maintenance::{self, MaintenanceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, EntityTrait, Set, TransactionError, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Input for opening a maintenance record.
#[derive(Debug, Clone)]
pub struct OpenMaintenanceInput {
    pub equipment_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub technician_user_id: Option<String>,
}

/// Service for maintenance records
#[derive(Clone)]
pub struct MaintenanceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MaintenanceService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens a maintenance record and parks the asset under maintenance.
    #[instrument(skip(self, input), fields(equipment_id = %input.equipment_id))]
    pub async fn open_maintenance(
        &self,
        input: OpenMaintenanceInput,
        actor_user_id: &str,
    ) -> Result<equipment_maintenance::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();

        let record = db
            .transaction::<_, equipment_maintenance::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let asset = equipment::Entity::find_by_id(input.equipment_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::from)?
                        .filter(|e| e.deleted_at.is_none())
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Equipment {} not found",
                                input.equipment_id
                            ))
                        })?;

                    if asset.status == EquipmentStatus::Retired {
                        return Err(ServiceError::InvalidState(format!(
                            "Equipment {} is retired",
                            asset.id
                        )));
                    }

                    let now = Utc::now();
                    let record = equipment_maintenance::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        equipment_id: Set(asset.id),
                        maintenance_type: Set(input.maintenance_type.clone()),
                        scheduled_for: Set(input.scheduled_for),
                        started_at: Set(Some(now)),
                        completed_at: Set(None),
                        technician_user_id: Set(input.technician_user_id.clone()),
                        result_note: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::from)?;

                    let old_status = asset.status.clone();
                    if old_status != EquipmentStatus::UnderMaintenance {
                        let mut active: equipment::ActiveModel = asset.into();
                        active.status = Set(EquipmentStatus::UnderMaintenance);
                        active.updated_at = Set(now);
                        active.update(txn).await.map_err(ServiceError::from)?;

                        audit::record_event(
                            txn,
                            record.equipment_id,
                            AuditEvent::StatusChanged,
                            json!({
                                "old_status": old_status,
                                "new_status": EquipmentStatus::UnderMaintenance,
                            }),
                            Some(actor.clone()),
                        )
                        .await
                        .map_err(ServiceError::from)?;
                    }

                    audit::record_event(
                        txn,
                        record.equipment_id,
                        AuditEvent::Maintained,
                        json!({
                            "maintenance_id": record.id,
                            "maintenance_type": record.maintenance_type.clone(),
                            "phase": "opened",
                        }),
                        Some(actor),
                    )
                    .await
                    .map_err(ServiceError::from)?;

                    Ok(record)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::MaintenanceOpened {
                maintenance_id: record.id,
                equipment_id: record.equipment_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(record)
    }

    /// Completes a maintenance record and reactivates the asset.
    #[instrument(skip(self))]
    pub async fn complete_maintenance(
        &self,
        maintenance_id: Uuid,
        result_note: Option<String>,
        actor_user_id: &str,
    ) -> Result<equipment_maintenance::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();

        let record = db
            .transaction::<_, equipment_maintenance::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let record = equipment_maintenance::Entity::find_by_id(maintenance_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::from)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Maintenance record {} not found",
                                maintenance_id
                            ))
                        })?;

                    if record.completed_at.is_some() {
                        return Err(ServiceError::InvalidState(format!(
                            "Maintenance record {} is already completed",
                            record.id
                        )));
                    }

                    let now = Utc::now();
                    let mut active: equipment_maintenance::ActiveModel = record.into();
                    active.completed_at = Set(Some(now));
                    active.result_note = Set(result_note.clone());
                    active.updated_at = Set(now);
                    let record = active.update(txn).await.map_err(ServiceError::from)?;

                    let asset = equipment::Entity::find_by_id(record.equipment_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::from)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Equipment {} not found",
                                record.equipment_id
                            ))
                        })?;

                    if asset.status == EquipmentStatus::UnderMaintenance {
                        let mut active: equipment::ActiveModel = asset.into();
                        active.status = Set(EquipmentStatus::Active);
                        active.updated_at = Set(now);
                        active.update(txn).await.map_err(ServiceError::from)?;

                        audit::record_event(
                            txn,
                            record.equipment_id,
                            AuditEvent::StatusChanged,
                            json!({
                                "old_status": EquipmentStatus::UnderMaintenance,
                                "new_status": EquipmentStatus::Active,
                            }),
                            Some(actor.clone()),
                        )
                        .await
                        .map_err(ServiceError::from)?;
                    }

                    audit::record_event(
                        txn,
                        record.equipment_id,
                        AuditEvent::Maintained,
                        json!({
                            "maintenance_id": record.id,
                            "maintenance_type": record.maintenance_type.clone(),
                            "phase": "completed",
                            "result_note": record.result_note.clone(),
                        }),
                        Some(actor),
                    )
                    .await
                    .map_err(ServiceError::from)?;

                    Ok(record)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::MaintenanceCompleted {
                maintenance_id: record.id,
                equipment_id: record.equipment_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(record)
    }

    /// Gets one maintenance record by ID.
    #[instrument(skip(self))]
    pub async fn history_entry(
        &self,
        maintenance_id: Uuid,
    ) -> Result<Option<equipment_maintenance::Model>, ServiceError> {
        equipment_maintenance::Entity::find_by_id(maintenance_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }

    /// Maintenance history for an asset, newest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<equipment_maintenance::Model>, ServiceError> {
        use sea_orm::{ColumnTrait, QueryFilter, QueryOrder};

        equipment_maintenance::Entity::find()
            .filter(equipment_maintenance::Column::EquipmentId.eq(equipment_id))
            .order_by_desc(equipment_maintenance::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::from)
    }
}
