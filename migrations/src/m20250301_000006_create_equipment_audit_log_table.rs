use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only: nothing in the crate issues UPDATE or DELETE here.
        manager
            .create_table(
                Table::create()
                    .table(EquipmentAuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EquipmentAuditLog::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentAuditLog::EquipmentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentAuditLog::EventType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EquipmentAuditLog::Payload).json().null())
                    .col(
                        ColumnDef::new(EquipmentAuditLog::ActorUserId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentAuditLog::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_audit_log_equipment_id")
                    .table(EquipmentAuditLog::Table)
                    .col(EquipmentAuditLog::EquipmentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EquipmentAuditLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum EquipmentAuditLog {
    Table,
    Id,
    EquipmentId,
    EventType,
    Payload,
    ActorUserId,
    CreatedAt,
}
