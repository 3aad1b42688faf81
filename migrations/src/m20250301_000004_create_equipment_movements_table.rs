use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EquipmentMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EquipmentMovements::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::EquipmentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::RequestedByUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::AuthorizedByUserId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::OriginLocationId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::OriginCustodianUserId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::TargetLocationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::TargetCustodianUserId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(EquipmentMovements::MovementNote).text().null())
                    .col(
                        ColumnDef::new(EquipmentMovements::AuthorizationNote)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::RequestedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::AuthorizedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::ExecutedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EquipmentMovements::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_movements_equipment_id")
                    .table(EquipmentMovements::Table)
                    .col(EquipmentMovements::EquipmentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_movements_status")
                    .table(EquipmentMovements::Table)
                    .col(EquipmentMovements::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EquipmentMovements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum EquipmentMovements {
    Table,
    Id,
    EquipmentId,
    RequestedByUserId,
    AuthorizedByUserId,
    OriginLocationId,
    OriginCustodianUserId,
    TargetLocationId,
    TargetCustodianUserId,
    Status,
    MovementNote,
    AuthorizationNote,
    RequestedAt,
    AuthorizedAt,
    ExecutedAt,
    CreatedAt,
    UpdatedAt,
}
