//! Create batches table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Batches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Batches::Reference)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Batches::Sku).string().not_null())
                    .col(
                        ColumnDef::new(Batches::PurchasedQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Batches::Eta).date())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batches_sku")
                    .table(Batches::Table)
                    .col(Batches::Sku)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Batches::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Batches {
    Table,
    Reference,
    Sku,
    PurchasedQuantity,
    Eta,
}
