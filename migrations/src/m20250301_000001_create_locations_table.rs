use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Locations::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Locations::Name).string().not_null())
                    .col(
                        ColumnDef::new(Locations::LocationType)
                            .string()
                            .not_null()
                            .default("room"),
                    )
                    .col(ColumnDef::new(Locations::ParentId).uuid().null())
                    .col(ColumnDef::new(Locations::Timezone).string().null())
                    .col(
                        ColumnDef::new(Locations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Locations::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Locations::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_locations_parent_id")
                    .table(Locations::Table)
                    .col(Locations::ParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Locations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Locations {
    Table,
    Id,
    Name,
    LocationType,
    ParentId,
    Timezone,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
