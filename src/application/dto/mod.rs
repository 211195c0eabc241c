//! Data transfer objects

pub mod command;

pub use command::{AddBatch, Allocate, BatchView, Deallocate};
