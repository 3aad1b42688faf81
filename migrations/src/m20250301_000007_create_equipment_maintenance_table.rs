use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EquipmentMaintenance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EquipmentMaintenance::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::EquipmentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::MaintenanceType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::ScheduledFor)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::StartedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::CompletedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::TechnicianUserId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::ResultNote)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMaintenance::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_maintenance_equipment_id")
                    .table(EquipmentMaintenance::Table)
                    .col(EquipmentMaintenance::EquipmentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EquipmentMaintenance::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum EquipmentMaintenance {
    Table,
    Id,
    EquipmentId,
    MaintenanceType,
    ScheduledFor,
    StartedAt,
    CompletedAt,
    TechnicianUserId,
    ResultNote,
    CreatedAt,
    UpdatedAt,
}
