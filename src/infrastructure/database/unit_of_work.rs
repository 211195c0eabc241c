//! SeaORM implementation of UnitOfWork
//!
//! One `DatabaseTransaction` per unit of work, shared with the repositories
//! it owns. Commit flushes every seen batch into that transaction and then
//! commits it; dropping the unit of work while active drops the transaction,
//! which SeaORM rolls back.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, info, warn};

use super::repositories::SeaOrmBatchRepository;
use crate::domain::{
    ensure_active, BatchRepository, DomainError, DomainResult, UnitOfWork, UnitOfWorkFactory,
    UnitOfWorkState,
};

const BACKEND: &str = "sea_orm";

pub struct SeaOrmUnitOfWork {
    db: DatabaseConnection,
    txn: Option<Arc<DatabaseTransaction>>,
    batches: Option<SeaOrmBatchRepository>,
    state: UnitOfWorkState,
}

impl SeaOrmUnitOfWork {
    /// An idle unit of work; call `begin` to open the transaction.
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            txn: None,
            batches: None,
            state: UnitOfWorkState::Idle,
        }
    }

    pub async fn begin(&mut self) -> DomainResult<()> {
        if self.state != UnitOfWorkState::Idle {
            return Err(DomainError::InvalidState(format!(
                "cannot begin a unit of work that is {}",
                self.state
            )));
        }

        let txn = Arc::new(
            self.db
                .begin()
                .await
                .map_err(|e| DomainError::Storage(format!("Database error: {}", e)))?,
        );
        self.batches = Some(SeaOrmBatchRepository::new(txn.clone()));
        self.txn = Some(txn);
        self.state = UnitOfWorkState::Active;
        debug!("Unit of work started");
        Ok(())
    }

    /// Release the repositories and hand back sole ownership of the
    /// transaction so it can be committed or rolled back.
    fn take_transaction(&mut self) -> DomainResult<DatabaseTransaction> {
        self.batches = None;
        let txn = self
            .txn
            .take()
            .ok_or_else(|| DomainError::InvalidState("no open transaction".to_string()))?;
        Arc::try_unwrap(txn).map_err(|_| {
            DomainError::InvalidState("transaction is still shared".to_string())
        })
    }

    async fn flush_and_commit(&mut self) -> DomainResult<()> {
        if let Some(batches) = &self.batches {
            batches.flush().await?;
        }
        let txn = self.take_transaction()?;
        txn.commit()
            .await
            .map_err(|e| DomainError::Commit(e.to_string()))
    }
}

#[async_trait]
impl UnitOfWork for SeaOrmUnitOfWork {
    fn batches(&mut self) -> DomainResult<&mut dyn BatchRepository> {
        ensure_active(self.state, "use")?;
        match self.batches.as_mut() {
            Some(repo) => Ok(repo),
            None => Err(DomainError::InvalidState(
                "repositories are not bound".to_string(),
            )),
        }
    }

    async fn commit(&mut self) -> DomainResult<()> {
        ensure_active(self.state, "commit")?;
        let seen = self.batches.as_ref().map_or(0, |b| b.seen().len());

        match self.flush_and_commit().await {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                metrics::counter!("uow_commits_total", "backend" => BACKEND).increment(1);
                info!(batches = seen, "Unit of work committed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Commit failed, rolling back");
                metrics::counter!("uow_commit_failures_total", "backend" => BACKEND)
                    .increment(1);
                // The original failure is what the caller needs to see.
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed commit also failed");
                }
                self.state = UnitOfWorkState::RolledBack;
                Err(match err {
                    DomainError::Commit(_) => err,
                    other => DomainError::Commit(other.to_string()),
                })
            }
        }
    }

    async fn rollback(&mut self) -> DomainResult<()> {
        if self.state != UnitOfWorkState::Active {
            debug!(state = %self.state, "Rollback ignored");
            return Ok(());
        }

        self.state = UnitOfWorkState::RolledBack;
        metrics::counter!("uow_rollbacks_total", "backend" => BACKEND).increment(1);

        // Committing already consumed the transaction on a failed commit.
        if self.txn.is_none() {
            self.batches = None;
            return Ok(());
        }

        let txn = self.take_transaction()?;
        txn.rollback()
            .await
            .map_err(|e| DomainError::Storage(format!("Database error: {}", e)))?;
        debug!("Unit of work rolled back");
        Ok(())
    }

    fn state(&self) -> UnitOfWorkState {
        self.state
    }
}

impl Drop for SeaOrmUnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Active {
            // Dropping the transaction below rolls it back.
            debug!("Unit of work dropped without commit, rolling back");
            metrics::counter!("uow_rollbacks_total", "backend" => BACKEND).increment(1);
        }
    }
}

/// Opens `SeaOrmUnitOfWork`s on a shared connection pool.
#[derive(Clone)]
pub struct SeaOrmUnitOfWorkFactory {
    db: DatabaseConnection,
}

impl SeaOrmUnitOfWorkFactory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UnitOfWorkFactory for SeaOrmUnitOfWorkFactory {
    async fn begin(&self) -> DomainResult<Box<dyn UnitOfWork>> {
        let mut uow = SeaOrmUnitOfWork::new(self.db.clone());
        uow.begin().await?;
        Ok(Box::new(uow))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    use super::*;
    use crate::domain::{Batch, OrderLine};
    use crate::infrastructure::database::test_database;

    async fn factory() -> SeaOrmUnitOfWorkFactory {
        SeaOrmUnitOfWorkFactory::new(test_database().await)
    }

    async fn insert_batch(uow: &SeaOrmUnitOfWorkFactory, reference: &str, sku: &str) {
        let mut scope = uow.begin().await.unwrap();
        scope
            .batches()
            .unwrap()
            .add(Batch::new(reference, sku, 100, None))
            .await
            .unwrap();
        scope.commit().await.unwrap();
    }

    async fn allocated_to(factory: &SeaOrmUnitOfWorkFactory, order_id: &str, sku: &str) -> Option<String> {
        let mut uow = factory.begin().await.unwrap();
        let found = uow
            .batches()
            .unwrap()
            .list()
            .await
            .unwrap()
            .into_iter()
            .find(|b| b.find_line(order_id, sku).is_some())
            .map(|b| b.reference().to_string());
        uow.rollback().await.unwrap();
        found
    }

    #[tokio::test]
    async fn can_retrieve_a_batch_and_allocate_to_it() {
        let factory = factory().await;
        insert_batch(&factory, "batch1", "HIPSTER-WORKBENCH").await;

        let mut uow = factory.begin().await.unwrap();
        let batch = uow.batches().unwrap().get("batch1").await.unwrap();
        batch
            .allocate(OrderLine::new("o1", "HIPSTER-WORKBENCH", 10))
            .unwrap();
        uow.commit().await.unwrap();
        drop(uow);

        assert_eq!(
            allocated_to(&factory, "o1", "HIPSTER-WORKBENCH").await.as_deref(),
            Some("batch1")
        );
    }

    #[tokio::test]
    async fn round_trips_batch_fields_and_allocations() {
        let factory = factory().await;
        let eta = NaiveDate::from_ymd_opt(2026, 11, 2);

        let mut original = Batch::new("batch1", "SKU1", 50, eta);
        original.allocate(OrderLine::new("o1", "SKU1", 5)).unwrap();
        original.allocate(OrderLine::new("o2", "SKU1", 7)).unwrap();

        let mut uow = factory.begin().await.unwrap();
        uow.batches().unwrap().add(original.clone()).await.unwrap();
        uow.commit().await.unwrap();
        drop(uow);

        let mut uow = factory.begin().await.unwrap();
        let loaded = uow.batches().unwrap().get("batch1").await.unwrap().clone();
        uow.rollback().await.unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.sku(), original.sku());
        assert_eq!(loaded.purchased_quantity(), original.purchased_quantity());
        assert_eq!(loaded.eta(), original.eta());
        assert_eq!(loaded.allocations(), original.allocations());
    }

    #[tokio::test]
    async fn rolls_back_uncommitted_work_by_default() {
        let factory = factory().await;
        {
            let mut uow = factory.begin().await.unwrap();
            uow.batches()
                .unwrap()
                .add(Batch::new("batch1", "MEDIUM-PLINTH", 100, None))
                .await
                .unwrap();
        }

        let mut uow = factory.begin().await.unwrap();
        let err = uow.batches().unwrap().get("batch1").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let factory = factory().await;
        insert_batch(&factory, "batch1", "LARGE-FORK").await;

        let result: DomainResult<()> = async {
            let mut uow = factory.begin().await?;
            uow.batches()?
                .get("batch1")
                .await?
                .allocate(OrderLine::new("o1", "LARGE-FORK", 10))?;
            // Second allocation overflows the batch before commit is reached.
            uow.batches()?
                .get("batch1")
                .await?
                .allocate(OrderLine::new("o2", "LARGE-FORK", 200))?;
            uow.commit().await
        }
        .await;

        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
        assert_eq!(allocated_to(&factory, "o1", "LARGE-FORK").await, None);
    }

    #[tokio::test]
    async fn commit_twice_is_invalid_state() {
        let factory = factory().await;
        let mut uow = factory.begin().await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(uow.state(), UnitOfWorkState::Committed);
        assert!(matches!(
            uow.commit().await,
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(uow.batches(), Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn commit_after_rollback_is_invalid_state() {
        let factory = factory().await;
        let mut uow = factory.begin().await.unwrap();
        uow.rollback().await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(uow.state(), UnitOfWorkState::RolledBack);
        assert!(matches!(
            uow.commit().await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn idle_unit_of_work_refuses_repository_access() {
        let db = test_database().await;
        let mut uow = SeaOrmUnitOfWork::new(db);
        assert_eq!(uow.state(), UnitOfWorkState::Idle);
        assert!(matches!(uow.batches(), Err(DomainError::InvalidState(_))));

        uow.begin().await.unwrap();
        assert!(matches!(
            uow.begin().await,
            Err(DomainError::InvalidState(_))
        ));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn constraint_violation_on_commit_surfaces_commit_error() {
        let db = test_database().await;
        let factory = SeaOrmUnitOfWorkFactory::new(db.clone());
        insert_batch(&factory, "batch1", "SKU1").await;
        insert_batch(&factory, "batch2", "SKU1").await;

        // Allocated to both batches in one scope: the one-batch-per-line
        // index rejects the flush.
        let line = OrderLine::new("o1", "SKU1", 5);
        let mut uow = factory.begin().await.unwrap();
        uow.batches().unwrap().get("batch1").await.unwrap().allocate(line.clone()).unwrap();
        uow.batches().unwrap().get("batch2").await.unwrap().allocate(line).unwrap();
        let err = uow.commit().await.unwrap_err();

        assert!(matches!(err, DomainError::Commit(_)));
        assert_eq!(uow.state(), UnitOfWorkState::RolledBack);
        drop(uow);

        let count = db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM allocations",
            ))
            .await
            .unwrap()
            .unwrap()
            .try_get::<i64>("", "n")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn moving_a_line_between_batches_commits() {
        let factory = factory().await;
        insert_batch(&factory, "batch1", "SKU1").await;
        insert_batch(&factory, "batch2", "SKU1").await;

        let line = OrderLine::new("o1", "SKU1", 5);
        let mut uow = factory.begin().await.unwrap();
        uow.batches().unwrap().get("batch1").await.unwrap().allocate(line.clone()).unwrap();
        uow.commit().await.unwrap();
        drop(uow);

        let mut uow = factory.begin().await.unwrap();
        assert!(uow.batches().unwrap().get("batch1").await.unwrap().deallocate(&line));
        uow.batches().unwrap().get("batch2").await.unwrap().allocate(line).unwrap();
        uow.commit().await.unwrap();
        drop(uow);

        assert_eq!(
            allocated_to(&factory, "o1", "SKU1").await.as_deref(),
            Some("batch2")
        );
    }
}
