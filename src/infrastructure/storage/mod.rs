//! In-memory storage backend

mod memory;

pub use memory::{
    InMemoryBatchRepository, InMemoryStore, InMemoryUnitOfWork, InMemoryUnitOfWorkFactory,
};
