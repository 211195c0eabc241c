//! Allocation aggregate
//!
//! Contains the Batch entity, the OrderLine value object, the batch
//! selection policy and the repository interface.

pub mod model;
pub mod policy;
pub mod repository;

pub use model::{Allocation, Batch, OrderLine};
pub use policy::allocate;
pub use repository::{BatchRepository, SeenBatches};
