//! Infrastructure layer - external concerns

pub mod database;
pub mod storage;

pub use database::{
    init_database, prepare_schema, reset_schema, DatabaseConfig, SeaOrmUnitOfWorkFactory,
};
pub use storage::{InMemoryStore, InMemoryUnitOfWorkFactory};
