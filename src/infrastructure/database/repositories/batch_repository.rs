//! SeaORM implementation of BatchRepository

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::allocation::{Batch, BatchRepository, OrderLine, SeenBatches};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{allocation, batch, order_line};

/// Batches stored in `batches` / `order_lines` / `allocations`, read and
/// written through the unit of work's transaction.
pub struct SeaOrmBatchRepository {
    txn: Arc<DatabaseTransaction>,
    seen: SeenBatches,
}

impl SeaOrmBatchRepository {
    pub fn new(txn: Arc<DatabaseTransaction>) -> Self {
        Self {
            txn,
            seen: SeenBatches::new(),
        }
    }

    /// Write every seen batch back to the transaction.
    ///
    /// Allocation rows of all seen batches are cleared before any are
    /// re-inserted, so a line moved between two seen batches does not trip
    /// the one-batch-per-line index halfway through.
    pub async fn flush(&self) -> DomainResult<()> {
        let txn = self.txn.as_ref();
        let references: Vec<String> = self
            .seen
            .iter()
            .map(|b| b.reference().to_string())
            .collect();

        if references.is_empty() {
            return Ok(());
        }

        allocation::Entity::delete_many()
            .filter(allocation::Column::BatchReference.is_in(references))
            .exec(txn)
            .await
            .map_err(db_err)?;

        for b in self.seen.iter() {
            debug!("Flushing batch: {}", b.reference());
            upsert_batch(txn, b).await?;
            for line in b.allocated_lines() {
                let line_id = find_or_insert_line(txn, line).await?;
                allocation::ActiveModel {
                    id: NotSet,
                    batch_reference: Set(b.reference().to_string()),
                    order_line_id: Set(line_id),
                }
                .insert(txn)
                .await
                .map_err(db_err)?;
            }
        }

        info!("Flushed {} batch(es)", self.seen.len());
        Ok(())
    }

    /// Forget every tracked batch without writing anything.
    pub fn discard(&mut self) {
        self.seen.clear();
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn to_column(quantity: u32) -> DomainResult<i32> {
    i32::try_from(quantity)
        .map_err(|_| DomainError::Validation(format!("quantity {} is too large to store", quantity)))
}

fn from_column(quantity: i32) -> DomainResult<u32> {
    u32::try_from(quantity)
        .map_err(|_| DomainError::Storage(format!("negative quantity {} in store", quantity)))
}

fn batch_from_model(model: batch::Model, lines: Vec<order_line::Model>) -> DomainResult<Batch> {
    let lines = lines
        .into_iter()
        .map(|l| Ok(OrderLine::new(l.order_id, l.sku, from_column(l.quantity)?)))
        .collect::<DomainResult<Vec<_>>>()?;

    Batch::restore(
        model.reference,
        model.sku,
        from_column(model.purchased_quantity)?,
        model.eta,
        lines,
    )
}

async fn load_lines<C: ConnectionTrait>(
    db: &C,
    references: Vec<String>,
) -> DomainResult<BTreeMap<String, Vec<order_line::Model>>> {
    let rows = allocation::Entity::find()
        .filter(allocation::Column::BatchReference.is_in(references))
        .find_also_related(order_line::Entity)
        .all(db)
        .await
        .map_err(db_err)?;

    let mut by_batch: BTreeMap<String, Vec<order_line::Model>> = BTreeMap::new();
    for (alloc, line) in rows {
        let line = line.ok_or_else(|| {
            DomainError::Storage(format!(
                "allocation {} points at a missing order line",
                alloc.id
            ))
        })?;
        by_batch.entry(alloc.batch_reference).or_default().push(line);
    }
    Ok(by_batch)
}

async fn load_batch<C: ConnectionTrait>(db: &C, reference: &str) -> DomainResult<Option<Batch>> {
    let Some(model) = batch::Entity::find_by_id(reference)
        .one(db)
        .await
        .map_err(db_err)?
    else {
        return Ok(None);
    };

    let mut lines = load_lines(db, vec![reference.to_string()]).await?;
    let lines = lines.remove(reference).unwrap_or_default();
    batch_from_model(model, lines).map(Some)
}

async fn load_all_batches<C: ConnectionTrait>(db: &C) -> DomainResult<Vec<Batch>> {
    let models = batch::Entity::find()
        .order_by_asc(batch::Column::Reference)
        .all(db)
        .await
        .map_err(db_err)?;

    let references = models.iter().map(|m| m.reference.clone()).collect();
    let mut lines = load_lines(db, references).await?;

    models
        .into_iter()
        .map(|m| {
            let batch_lines = lines.remove(&m.reference).unwrap_or_default();
            batch_from_model(m, batch_lines)
        })
        .collect()
}

async fn upsert_batch<C: ConnectionTrait>(db: &C, b: &Batch) -> DomainResult<()> {
    let existing = batch::Entity::find_by_id(b.reference())
        .one(db)
        .await
        .map_err(db_err)?;

    let model = batch::ActiveModel {
        reference: Set(b.reference().to_string()),
        sku: Set(b.sku().to_string()),
        purchased_quantity: Set(to_column(b.purchased_quantity())?),
        eta: Set(b.eta()),
    };

    if existing.is_some() {
        model.update(db).await.map_err(db_err)?;
    } else {
        model.insert(db).await.map_err(db_err)?;
    }
    Ok(())
}

async fn find_or_insert_line<C: ConnectionTrait>(db: &C, line: &OrderLine) -> DomainResult<i32> {
    let quantity = to_column(line.quantity)?;
    let existing = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(line.order_id.as_str()))
        .filter(order_line::Column::Sku.eq(line.sku.as_str()))
        .filter(order_line::Column::Quantity.eq(quantity))
        .one(db)
        .await
        .map_err(db_err)?;

    if let Some(row) = existing {
        return Ok(row.id);
    }

    let inserted = order_line::ActiveModel {
        id: NotSet,
        order_id: Set(line.order_id.clone()),
        sku: Set(line.sku.clone()),
        quantity: Set(quantity),
    }
    .insert(db)
    .await
    .map_err(db_err)?;
    Ok(inserted.id)
}

// ── BatchRepository impl ────────────────────────────────────────

#[async_trait]
impl BatchRepository for SeaOrmBatchRepository {
    async fn add(&mut self, b: Batch) -> DomainResult<()> {
        debug!("Adding batch: {}", b.reference());

        let exists = self.seen.contains(b.reference())
            || batch::Entity::find_by_id(b.reference())
                .one(self.txn.as_ref())
                .await
                .map_err(db_err)?
                .is_some();

        if exists {
            return Err(DomainError::DuplicateKey(format!(
                "Batch '{}' already exists",
                b.reference()
            )));
        }

        self.seen.track(b);
        Ok(())
    }

    async fn get(&mut self, reference: &str) -> DomainResult<&mut Batch> {
        if !self.seen.contains(reference) {
            let loaded = load_batch(self.txn.as_ref(), reference)
                .await?
                .ok_or_else(|| DomainError::batch_not_found(reference))?;
            self.seen.track(loaded);
        }

        self.seen
            .get_mut(reference)
            .ok_or_else(|| DomainError::batch_not_found(reference))
    }

    async fn list(&mut self) -> DomainResult<Vec<&mut Batch>> {
        for loaded in load_all_batches(self.txn.as_ref()).await? {
            self.seen.track(loaded);
        }
        Ok(self.seen.iter_mut().collect())
    }

    fn seen(&self) -> Vec<&Batch> {
        self.seen.iter().collect()
    }
}
