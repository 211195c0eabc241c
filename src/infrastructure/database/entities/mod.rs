//! Database entities module

pub mod allocation;
pub mod batch;
pub mod order_line;

pub use allocation::Entity as Allocation;
pub use batch::Entity as Batch;
pub use order_line::Entity as OrderLine;
