//! Batch / order line domain entities

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{DomainError, DomainResult};

/// A customer's request for a quantity of one SKU.
///
/// Value object: two lines with the same order, sku and quantity are the
/// same line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OrderLine {
    pub order_id: String,
    pub sku: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(order_id: impl Into<String>, sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}

/// Link between an order line and the batch it was allocated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub batch_reference: String,
    pub line: OrderLine,
}

/// Stock ordered by the purchasing department.
///
/// Identity is the `reference`; two batches with the same reference compare
/// equal whatever their other fields hold.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: String,
    sku: String,
    purchased_quantity: u32,
    /// `None` means the stock is already in the warehouse.
    eta: Option<NaiveDate>,
    allocations: BTreeSet<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<String>,
        sku: impl Into<String>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: BTreeSet::new(),
        }
    }

    /// Rebuild a batch from stored state, re-checking every invariant that
    /// `allocate` would have enforced.
    pub fn restore(
        reference: impl Into<String>,
        sku: impl Into<String>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
        allocations: impl IntoIterator<Item = OrderLine>,
    ) -> DomainResult<Self> {
        let mut batch = Self::new(reference, sku, purchased_quantity, eta);
        for line in allocations {
            batch.allocate(line)?;
        }
        Ok(batch)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// Allocated lines, ordered.
    pub fn allocated_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn allocations(&self) -> Vec<Allocation> {
        self.allocations
            .iter()
            .map(|line| Allocation {
                batch_reference: self.reference.clone(),
                line: line.clone(),
            })
            .collect()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(|l| l.quantity).sum()
    }

    pub fn available_quantity(&self) -> u32 {
        self.purchased_quantity
            .saturating_sub(self.allocated_quantity())
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= line.quantity
    }

    /// Allocate `line` to this batch. Allocating a line that is already
    /// allocated here changes nothing.
    pub fn allocate(&mut self, line: OrderLine) -> DomainResult<()> {
        if self.allocations.contains(&line) {
            return Ok(());
        }
        if self.sku != line.sku {
            return Err(DomainError::InvariantViolation(format!(
                "line {} is for sku {}, batch {} holds {}",
                line.order_id, line.sku, self.reference, self.sku
            )));
        }
        if line.quantity > self.available_quantity() {
            return Err(DomainError::InvariantViolation(format!(
                "batch {} has {} available, line {} needs {}",
                self.reference,
                self.available_quantity(),
                line.order_id,
                line.quantity
            )));
        }
        self.allocations.insert(line);
        Ok(())
    }

    /// Returns false if the line was not allocated to this batch.
    pub fn deallocate(&mut self, line: &OrderLine) -> bool {
        self.allocations.remove(line)
    }

    /// The allocated line for `order_id`/`sku`, if any.
    pub fn find_line(&self, order_id: &str, sku: &str) -> Option<&OrderLine> {
        self.allocations
            .iter()
            .find(|l| l.order_id == order_id && l.sku == sku)
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

// ── Tests ──────────────────────────────────────────────────────
