//! # Allocation Service
//!
//! Allocates customer order lines to stock batches, persisted through the
//! Repository and Unit of Work patterns.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Batch / OrderLine model, allocation policy, repository and
//!   unit of work traits
//! - **application**: Use cases and command DTOs
//! - **infrastructure**: SeaORM (SQLite) and in-memory storage backends
//! - **shared**: Errors, validation and retry helpers
//! - **config** / **bootstrap**: TOML configuration, tracing and wiring

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use config::{default_config_path, AppConfig, ConfigError};

pub use application::AllocationService;
pub use bootstrap::{init_tracing, AppHandle, AppOptions};
pub use domain::{Batch, DomainError, DomainResult, OrderLine, UnitOfWork, UnitOfWorkFactory};

// Re-export database types for easy access
pub use infrastructure::{
    init_database, prepare_schema, reset_schema, DatabaseConfig, InMemoryStore,
    InMemoryUnitOfWorkFactory, SeaOrmUnitOfWorkFactory,
};
