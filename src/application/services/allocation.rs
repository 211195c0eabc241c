//! Allocation use cases
//!
//! Each operation opens its own unit of work, does its work through the
//! repository and commits. Returning early with an error drops the unit of
//! work, which rolls it back.

use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::application::dto::{AddBatch, Allocate, BatchView, Deallocate};
use crate::domain::{
    allocate, Batch, BatchRepository, DomainError, DomainResult, OrderLine, UnitOfWorkFactory,
};
use crate::shared::utills::{retry_transient, RetryConfig};

/// Service for stock allocation operations
#[derive(Clone)]
pub struct AllocationService {
    uow: Arc<dyn UnitOfWorkFactory>,
}

impl AllocationService {
    pub fn new(uow: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow }
    }

    pub async fn add_batch(&self, cmd: AddBatch) -> DomainResult<()> {
        cmd.validate()?;

        let mut uow = self.uow.begin().await?;
        uow.batches()?
            .add(Batch::new(cmd.reference.clone(), cmd.sku.clone(), cmd.quantity, cmd.eta))
            .await?;
        uow.commit().await?;

        info!(reference = %cmd.reference, sku = %cmd.sku, quantity = cmd.quantity, "Batch added");
        Ok(())
    }

    /// Allocate an order line and return the reference of the chosen batch.
    pub async fn allocate(&self, cmd: Allocate) -> DomainResult<String> {
        cmd.validate()?;
        let line = cmd.line();

        let mut uow = self.uow.begin().await?;
        let batchref = allocate_in(uow.batches()?, line).await?;
        uow.commit().await?;

        info!(order_id = %cmd.order_id, sku = %cmd.sku, batch = %batchref, "Line allocated");
        Ok(batchref)
    }

    /// `allocate`, retried from a fresh unit of work on transient failures.
    pub async fn allocate_with_retry(
        &self,
        cmd: Allocate,
        retry: &RetryConfig,
    ) -> DomainResult<String> {
        retry_transient(retry, "allocate", move || self.allocate(cmd.clone())).await
    }

    /// Remove an order line from whichever batch holds it and return that
    /// batch's reference.
    pub async fn deallocate(&self, cmd: Deallocate) -> DomainResult<String> {
        cmd.validate()?;

        let mut uow = self.uow.begin().await?;
        let (batchref, _) = deallocate_in(uow.batches()?, &cmd.order_id, &cmd.sku).await?;
        uow.commit().await?;

        info!(order_id = %cmd.order_id, sku = %cmd.sku, batch = %batchref, "Line deallocated");
        Ok(batchref)
    }

    /// Move an allocated line to the best batch available now. Deallocation
    /// and re-allocation commit together or not at all.
    pub async fn reallocate(&self, cmd: Deallocate) -> DomainResult<String> {
        cmd.validate()?;

        let mut uow = self.uow.begin().await?;
        let repo = uow.batches()?;
        let (from, line) = deallocate_in(&mut *repo, &cmd.order_id, &cmd.sku).await?;
        let to = allocate_in(repo, line).await?;
        uow.commit().await?;

        info!(order_id = %cmd.order_id, sku = %cmd.sku, from = %from, to = %to, "Line reallocated");
        Ok(to)
    }

    pub async fn list_batches(&self) -> DomainResult<Vec<BatchView>> {
        let mut uow = self.uow.begin().await?;
        let views = uow
            .batches()?
            .list()
            .await?
            .into_iter()
            .map(|b| BatchView::from(&*b))
            .collect();
        uow.rollback().await?;
        Ok(views)
    }
}

async fn allocate_in(repo: &mut dyn BatchRepository, line: OrderLine) -> DomainResult<String> {
    let batches = repo.list().await?;
    if !batches.iter().any(|b| b.sku() == line.sku) {
        return Err(DomainError::InvalidSku(line.sku));
    }
    if let Some(b) = batches.iter().find(|b| b.is_allocated(&line)) {
        return Ok(b.reference().to_string());
    }
    allocate(line, batches)
}

async fn deallocate_in(
    repo: &mut dyn BatchRepository,
    order_id: &str,
    sku: &str,
) -> DomainResult<(String, OrderLine)> {
    for batch in repo.list().await? {
        if let Some(line) = batch.find_line(order_id, sku).cloned() {
            batch.deallocate(&line);
            debug!(order_id, sku, batch = batch.reference(), "Found allocated line");
            return Ok((batch.reference().to_string(), line));
        }
    }
    Err(DomainError::NotFound {
        entity: "Allocation",
        field: "order_id",
        value: format!("{}/{}", order_id, sku),
    })
}
