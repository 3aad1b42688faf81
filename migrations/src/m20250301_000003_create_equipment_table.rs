use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Equipment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Equipment::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Equipment::AssetCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Equipment::Name).string().not_null())
                    .col(ColumnDef::new(Equipment::Description).text().null())
                    .col(ColumnDef::new(Equipment::Category).string().null())
                    .col(
                        ColumnDef::new(Equipment::Criticality)
                            .string()
                            .not_null()
                            .default("medium"),
                    )
                    .col(
                        ColumnDef::new(Equipment::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Equipment::LocationId).uuid().null())
                    .col(ColumnDef::new(Equipment::CustodianUserId).string().null())
                    .col(ColumnDef::new(Equipment::OwningGroupId).string().null())
                    .col(ColumnDef::new(Equipment::AcquisitionDate).timestamp().null())
                    .col(ColumnDef::new(Equipment::Metadata).json().null())
                    .col(ColumnDef::new(Equipment::DeletedAt).timestamp().null())
                    .col(ColumnDef::new(Equipment::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Equipment::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_location_id")
                    .table(Equipment::Table)
                    .col(Equipment::LocationId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_equipment_category")
                    .table(Equipment::Table)
                    .col(Equipment::Category)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Equipment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Equipment {
    Table,
    Id,
    AssetCode,
    Name,
    Description,
    Category,
    Criticality,
    Status,
    LocationId,
    CustodianUserId,
    OwningGroupId,
    AcquisitionDate,
    Metadata,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}
