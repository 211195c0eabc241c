//! Create allocations table

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_batches::Batches;
use super::m20240101_000002_create_order_lines::OrderLines;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Allocations::BatchReference)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::OrderLineId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allocations_batch")
                            .from(Allocations::Table, Allocations::BatchReference)
                            .to(Batches::Table, Batches::Reference)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allocations_order_line")
                            .from(Allocations::Table, Allocations::OrderLineId)
                            .to(OrderLines::Table, OrderLines::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One batch per order line at a time
        manager
            .create_index(
                Index::create()
                    .name("idx_allocations_order_line")
                    .table(Allocations::Table)
                    .col(Allocations::OrderLineId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Allocations {
    Table,
    Id,
    BatchReference,
    OrderLineId,
}
