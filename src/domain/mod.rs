pub mod allocation;
pub mod repositories;

// Re-export commonly used types
pub use allocation::{allocate, Allocation, Batch, BatchRepository, OrderLine, SeenBatches};
pub use repositories::{
    ensure_active, DomainResult, UnitOfWork, UnitOfWorkFactory, UnitOfWorkState,
};

pub use crate::shared::errors::DomainError;
