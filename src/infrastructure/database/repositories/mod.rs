//! Database repository implementations

pub mod batch_repository;

pub use batch_repository::SeaOrmBatchRepository;
