use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MovementPolicies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MovementPolicies::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MovementPolicies::Name).string().not_null())
                    .col(ColumnDef::new(MovementPolicies::Scope).string().not_null())
                    .col(ColumnDef::new(MovementPolicies::Role).string().null())
                    .col(ColumnDef::new(MovementPolicies::LocationId).uuid().null())
                    .col(ColumnDef::new(MovementPolicies::Category).string().null())
                    .col(
                        ColumnDef::new(MovementPolicies::RequiresApproval)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MovementPolicies::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementPolicies::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MovementPolicies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MovementPolicies {
    Table,
    Id,
    Name,
    Scope,
    Role,
    LocationId,
    Category,
    RequiresApproval,
    CreatedAt,
    UpdatedAt,
}
