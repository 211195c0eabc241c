//! Command DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{Batch, OrderLine};
use crate::shared::validations::validate_identifier;

/// New stock arriving, or already in the warehouse when `eta` is `None`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddBatch {
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub reference: String,
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub sku: String,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be between 1 and 1000000"))]
    pub quantity: u32,
    pub eta: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Allocate {
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub order_id: String,
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub sku: String,
    #[validate(range(min = 1, max = 1_000_000, message = "quantity must be between 1 and 1000000"))]
    pub quantity: u32,
}

impl Allocate {
    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.quantity)
    }
}

/// Identifies an allocated line by order and sku.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Deallocate {
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub order_id: String,
    #[validate(length(max = 64), custom(function = "validate_identifier"))]
    pub sku: String,
}

/// Read model of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchView {
    pub reference: String,
    pub sku: String,
    pub purchased_quantity: u32,
    pub available_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<NaiveDate>,
    pub allocations: Vec<OrderLine>,
}

impl From<&Batch> for BatchView {
    fn from(b: &Batch) -> Self {
        Self {
            reference: b.reference().to_string(),
            sku: b.sku().to_string(),
            purchased_quantity: b.purchased_quantity(),
            available_quantity: b.available_quantity(),
            eta: b.eta(),
            allocations: b.allocated_lines().cloned().collect(),
        }
    }
}
