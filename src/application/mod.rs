pub mod dto;
pub mod services;

// Re-export key types for convenience
pub use dto::{AddBatch, Allocate, BatchView, Deallocate};
pub use services::AllocationService;
