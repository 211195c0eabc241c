//! Application services

mod allocation;

pub use allocation::AllocationService;
