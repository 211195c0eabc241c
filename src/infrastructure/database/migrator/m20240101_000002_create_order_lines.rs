//! Create order_lines table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderLines::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderLines::OrderId).string().not_null())
                    .col(ColumnDef::new(OrderLines::Sku).string().not_null())
                    .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Order lines are values: one row per (order, sku, quantity)
        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_value")
                    .table(OrderLines::Table)
                    .col(OrderLines::OrderId)
                    .col(OrderLines::Sku)
                    .col(OrderLines::Quantity)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderLines::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum OrderLines {
    Table,
    Id,
    OrderId,
    Sku,
    Quantity,
}
