use crate::{
    db::DbPool,
    entities::{
        equipment::{self, CriticalityTier, EquipmentStatus},
        equipment_audit_log::AuditEvent,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for registering an equipment asset.
#[derive(Debug, Clone)]
pub struct RegisterEquipmentInput {
    pub asset_code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub criticality: CriticalityTier,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
    pub owning_group_id: Option<String>,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

/// Descriptive fields an edit may touch. Location and custodian are absent
/// on purpose: only the movement execute path writes those.
#[derive(Debug, Clone, Default)]
pub struct UpdateEquipmentInput {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub criticality: Option<CriticalityTier>,
    pub owning_group_id: Option<Option<String>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

/// Filters for listing equipment.
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilters {
    pub status: Option<EquipmentStatus>,
    pub category: Option<String>,
    pub location_id: Option<Uuid>,
    pub custodian_user_id: Option<String>,
}

/// Service for the equipment directory
#[derive(Clone)]
pub struct EquipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl EquipmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers an asset and writes its `registered` audit entry.
    #[instrument(skip(self, input), fields(asset_code = %input.asset_code))]
    pub async fn register_equipment(
        &self,
        input: RegisterEquipmentInput,
        actor_user_id: &str,
    ) -> Result<equipment::Model, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Equipment name must not be empty".into(),
            ));
        }
        if input.asset_code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Asset code must not be empty".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();

        let created = db
            .transaction::<_, equipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let existing = equipment::Entity::find()
                        .filter(equipment::Column::AssetCode.eq(input.asset_code.trim()))
                        .one(txn)
                        .await
                        .map_err(ServiceError::from)?;
                    if existing.is_some() {
                        return Err(ServiceError::ValidationError(format!(
                            "Asset code {} already exists",
                            input.asset_code.trim()
                        )));
                    }

                    let now = Utc::now();
                    let asset = equipment::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        asset_code: Set(input.asset_code.trim().to_string()),
                        name: Set(input.name.trim().to_string()),
                        description: Set(input.description.clone()),
                        category: Set(input.category.clone()),
                        criticality: Set(input.criticality.clone()),
                        status: Set(EquipmentStatus::Active),
                        location_id: Set(input.location_id),
                        custodian_user_id: Set(input.custodian_user_id.clone()),
                        owning_group_id: Set(input.owning_group_id.clone()),
                        acquisition_date: Set(input.acquisition_date),
                        metadata: Set(input.metadata.clone()),
                        deleted_at: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::from)?;

                    audit::record_event(
                        txn,
                        asset.id,
                        AuditEvent::Registered,
                        json!({
                            "asset_code": asset.asset_code.clone(),
                            "name": asset.name.clone(),
                            "location_id": asset.location_id,
                        }),
                        Some(actor),
                    )
                    .await
                    .map_err(ServiceError::from)?;

                    Ok(asset)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::EquipmentRegistered(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    /// Edits descriptive fields and writes an `edited` audit entry.
    #[instrument(skip(self, input))]
    pub async fn update_equipment(
        &self,
        equipment_id: Uuid,
        input: UpdateEquipmentInput,
        actor_user_id: &str,
    ) -> Result<equipment::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();

        let updated = db
            .transaction::<_, equipment::Model, ServiceError>(|txn| {
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

                    let mut changed: Vec<&str> = Vec::new();
                    let mut active: equipment::ActiveModel = asset.into();

                    if let Some(name) = &input.name {
                        if name.trim().is_empty() {
                            return Err(ServiceError::ValidationError(
                                "Equipment name must not be empty".into(),
                            ));
                        }
                        active.name = Set(name.trim().to_string());
                        changed.push("name");
                    }
                    if let Some(description) = &input.description {
                        active.description = Set(description.clone());
                        changed.push("description");
                    }
                    if let Some(category) = &input.category {
                        active.category = Set(category.clone());
                        changed.push("category");
                    }
                    if let Some(criticality) = &input.criticality {
                        active.criticality = Set(criticality.clone());
                        changed.push("criticality");
                    }
                    if let Some(owning_group_id) = &input.owning_group_id {
                        active.owning_group_id = Set(owning_group_id.clone());
                        changed.push("owning_group_id");
                    }
                    if let Some(metadata) = &input.metadata {
                        active.metadata = Set(metadata.clone());
                        changed.push("metadata");
                    }

                    if changed.is_empty() {
                        return Err(ServiceError::ValidationError(
                            "No fields to update".into(),
                        ));
                    }

                    active.updated_at = Set(Utc::now());
                    let updated = active.update(txn).await.map_err(ServiceError::from)?;

                    audit::record_event(
                        txn,
                        updated.id,
                        AuditEvent::Edited,
                        json!({ "fields": changed }),
                        Some(actor),
                    )
                    .await
                    .map_err(ServiceError::from)?;

                    Ok(updated)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::EquipmentUpdated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Changes the lifecycle status, writing a `status_changed` entry.
    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        equipment_id: Uuid,
        new_status: EquipmentStatus,
        actor_user_id: &str,
    ) -> Result<equipment::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();
        let next = new_status.clone();

        let (updated, old_status) = db
            .transaction::<_, (equipment::Model, EquipmentStatus), ServiceError>(|txn| {
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

                    let old_status = asset.status.clone();
                    if old_status == next {
                        return Ok((asset, old_status));
                    }

                    let mut active: equipment::ActiveModel = asset.into();
                    active.status = Set(next.clone());
                    active.updated_at = Set(Utc::now());
                    let updated = active.update(txn).await.map_err(ServiceError::from)?;

                    audit::record_event(
                        txn,
                        updated.id,
                        AuditEvent::StatusChanged,
                        json!({
                            "old_status": old_status.clone(),
                            "new_status": updated.status.clone(),
                        }),
                        Some(actor),
                    )
                    .await
                    .map_err(ServiceError::from)?;

                    Ok((updated, old_status))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        if old_status != updated.status {
            info!(
                equipment_id = %updated.id,
                old_status = ?old_status,
                new_status = ?updated.status,
                "Equipment status changed"
            );
            self.event_sender
                .send(Event::EquipmentStatusChanged {
                    equipment_id: updated.id,
                    old_status: format!("{:?}", old_status),
                    new_status: format!("{:?}", updated.status),
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(updated)
    }

    /// Soft-deletes an asset; history and audit entries remain.
    #[instrument(skip(self))]
    pub async fn soft_delete(
        &self,
        equipment_id: Uuid,
        actor_user_id: &str,
    ) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let actor = actor_user_id.to_string();

        db.transaction::<_, (), ServiceError>(|txn| {
            Box::pin(async move {
                let asset = equipment::Entity::find_by_id(equipment_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::from)?
                    .filter(|e| e.deleted_at.is_none())
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Equipment {} not found", equipment_id))
                    })?;

                let mut active: equipment::ActiveModel = asset.into();
                let now = Utc::now();
                active.deleted_at = Set(Some(now));
                active.updated_at = Set(now);
                let deleted = active.update(txn).await.map_err(ServiceError::from)?;

                audit::record_event(
                    txn,
                    deleted.id,
                    AuditEvent::Edited,
                    json!({ "deleted": true }),
                    Some(actor),
                )
                .await
                .map_err(ServiceError::from)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Gets an asset by ID, excluding soft-deleted rows.
    #[instrument(skip(self))]
    pub async fn get_equipment(
        &self,
        equipment_id: &Uuid,
    ) -> Result<Option<equipment::Model>, ServiceError> {
        Ok(equipment::Entity::find_by_id(*equipment_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::from)?
            .filter(|e| e.deleted_at.is_none()))
    }

    /// Lists equipment with pagination and optional filters.
    #[instrument(skip(self))]
    pub async fn list_equipment(
        &self,
        filters: EquipmentFilters,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<equipment::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = equipment::Entity::find()
            .filter(equipment::Column::DeletedAt.is_null())
            .order_by_desc(equipment::Column::CreatedAt);

        if let Some(status) = filters.status {
            query = query.filter(equipment::Column::Status.eq(status));
        }
        if let Some(category) = filters.category {
            query = query.filter(equipment::Column::Category.eq(category));
        }
        if let Some(location_id) = filters.location_id {
            query = query.filter(equipment::Column::LocationId.eq(location_id));
        }
        if let Some(custodian) = filters.custodian_user_id {
            query = query.filter(equipment::Column::CustodianUserId.eq(custodian));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::from)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from)?;

        Ok((items, total))
    }
}
