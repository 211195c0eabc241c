//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_batches;
mod m20240101_000002_create_order_lines;
mod m20240101_000003_create_allocations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_batches::Migration),
            Box::new(m20240101_000002_create_order_lines::Migration),
            Box::new(m20240101_000003_create_allocations::Migration),
        ]
    }
}
