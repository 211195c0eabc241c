//! Batch selection policy

use std::cmp::Ordering;

use super::model::{Batch, OrderLine};
use crate::domain::{DomainError, DomainResult};

/// Warehouse stock (no eta) sorts first, then shipments by arrival date.
fn arrives_before(a: &Batch, b: &Batch) -> Ordering {
    match (a.eta(), b.eta()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
    .then_with(|| a.reference().cmp(b.reference()))
}

/// Allocate `line` to the earliest-arriving batch that can take it and
/// return that batch's reference.
pub fn allocate<'a, I>(line: OrderLine, batches: I) -> DomainResult<String>
where
    I: IntoIterator<Item = &'a mut Batch>,
{
    let mut candidates: Vec<&mut Batch> = batches
        .into_iter()
        .filter(|b| b.can_allocate(&line))
        .collect();
    candidates.sort_by(|a, b| arrives_before(a, b));

    let batch = candidates
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::OutOfStock(line.sku.clone()))?;

    batch.allocate(line)?;
    Ok(batch.reference().to_string())
}
