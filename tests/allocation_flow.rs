//! End-to-end scenarios run against both storage backends.

use std::sync::Arc;

use chrono::NaiveDate;

use allocation::domain::{Batch, DomainResult, OrderLine};
use allocation::{
    init_database, prepare_schema, DatabaseConfig, DomainError, InMemoryUnitOfWorkFactory,
    SeaOrmUnitOfWorkFactory, UnitOfWorkFactory,
};

async fn sea_orm_factory() -> Arc<dyn UnitOfWorkFactory> {
    let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    prepare_schema(&db).await.unwrap();
    Arc::new(SeaOrmUnitOfWorkFactory::new(db))
}

fn memory_factory() -> Arc<dyn UnitOfWorkFactory> {
    Arc::new(InMemoryUnitOfWorkFactory::default())
}

async fn allocation_survives_commit(factory: Arc<dyn UnitOfWorkFactory>) {
    let mut uow = factory.begin().await.unwrap();
    let repo = uow.batches().unwrap();
    repo.add(Batch::new("batch1", "SKU1", 100, None)).await.unwrap();
    repo.get("batch1")
        .await
        .unwrap()
        .allocate(OrderLine::new("order1", "SKU1", 10))
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = factory.begin().await.unwrap();
    let batch = uow.batches().unwrap().get("batch1").await.unwrap();
    assert_eq!(batch.available_quantity(), 90);
    assert!(batch.is_allocated(&OrderLine::new("order1", "SKU1", 10)));
}

async fn uncommitted_work_is_discarded(factory: Arc<dyn UnitOfWorkFactory>) {
    {
        let mut uow = factory.begin().await.unwrap();
        uow.batches()
            .unwrap()
            .add(Batch::new("batch1", "SKU1", 100, None))
            .await
            .unwrap();
    }

    let mut uow = factory.begin().await.unwrap();
    assert!(uow.batches().unwrap().list().await.unwrap().is_empty());
}

async fn missing_batch_is_not_found(factory: Arc<dyn UnitOfWorkFactory>) {
    let mut uow = factory.begin().await.unwrap();
    let err = uow.batches().unwrap().get("nonexistent").await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::NotFound { entity: "Batch", ref value, .. } if value == "nonexistent"
    ));
}

async fn closed_unit_of_work_rejects_use(factory: Arc<dyn UnitOfWorkFactory>) {
    let mut uow = factory.begin().await.unwrap();
    uow.commit().await.unwrap();
    assert!(matches!(uow.batches(), Err(DomainError::InvalidState(_))));
    assert!(matches!(uow.commit().await, Err(DomainError::InvalidState(_))));
    uow.rollback().await.unwrap();
}

async fn add_and_commit(factory: &Arc<dyn UnitOfWorkFactory>, batch: Batch) {
    let mut uow = factory.begin().await.unwrap();
    uow.batches().unwrap().add(batch).await.unwrap();
    uow.commit().await.unwrap();
}

async fn three_scope_scenario(factory: Arc<dyn UnitOfWorkFactory>) {
    add_and_commit(&factory, Batch::new("batch1", "SKU1", 100, None)).await;

    let mut uow = factory.begin().await.unwrap();
    uow.batches()
        .unwrap()
        .get("batch1")
        .await
        .unwrap()
        .allocate(OrderLine::new("order1", "SKU1", 10))
        .unwrap();
    uow.commit().await.unwrap();
    drop(uow);

    let mut uow = factory.begin().await.unwrap();
    let batch = uow.batches().unwrap().get("batch1").await.unwrap();
    assert!(batch.is_allocated(&OrderLine::new("order1", "SKU1", 10)));
    assert_eq!(batch.available_quantity(), 90);
}

async fn round_trip(factory: Arc<dyn UnitOfWorkFactory>) {
    let eta = NaiveDate::from_ymd_opt(2026, 11, 2);
    let mut original = Batch::new("batch1", "SKU1", 50, eta);
    original.allocate(OrderLine::new("o1", "SKU1", 5)).unwrap();
    original.allocate(OrderLine::new("o2", "SKU1", 7)).unwrap();
    add_and_commit(&factory, original.clone()).await;

    let mut uow = factory.begin().await.unwrap();
    let loaded = uow.batches().unwrap().get("batch1").await.unwrap().clone();
    uow.rollback().await.unwrap();

    assert_eq!(loaded.reference(), "batch1");
    assert_eq!(loaded.sku(), "SKU1");
    assert_eq!(loaded.purchased_quantity(), 50);
    assert_eq!(loaded.eta(), eta);
    assert_eq!(loaded.allocations(), original.allocations());
    assert_eq!(loaded.available_quantity(), 38);
}

async fn rolls_back_on_error(factory: Arc<dyn UnitOfWorkFactory>) {
    add_and_commit(&factory, Batch::new("batch1", "SKU1", 100, None)).await;

    let result: DomainResult<()> = async {
        let mut uow = factory.begin().await?;
        uow.batches()?
            .get("batch1")
            .await?
            .allocate(OrderLine::new("o1", "SKU1", 10))?;
        uow.batches()?
            .get("batch1")
            .await?
            .allocate(OrderLine::new("o2", "SKU1", 200))?;
        uow.commit().await
    }
    .await;
    assert!(matches!(result, Err(DomainError::InvariantViolation(_))));

    let mut uow = factory.begin().await.unwrap();
    let batch = uow.batches().unwrap().get("batch1").await.unwrap();
    assert!(!batch.is_allocated(&OrderLine::new("o1", "SKU1", 10)));
    assert_eq!(batch.available_quantity(), 100);
}

#[tokio::test]
async fn sea_orm_allocation_survives_commit() {
    allocation_survives_commit(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_allocation_survives_commit() {
    allocation_survives_commit(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_uncommitted_work_is_discarded() {
    uncommitted_work_is_discarded(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_uncommitted_work_is_discarded() {
    uncommitted_work_is_discarded(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_missing_batch_is_not_found() {
    missing_batch_is_not_found(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_missing_batch_is_not_found() {
    missing_batch_is_not_found(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_closed_unit_of_work_rejects_use() {
    closed_unit_of_work_rejects_use(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_closed_unit_of_work_rejects_use() {
    closed_unit_of_work_rejects_use(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_three_scope_scenario() {
    three_scope_scenario(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_three_scope_scenario() {
    three_scope_scenario(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_round_trip() {
    round_trip(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_round_trip() {
    round_trip(memory_factory()).await;
}

#[tokio::test]
async fn sea_orm_rolls_back_on_error() {
    rolls_back_on_error(sea_orm_factory().await).await;
}

#[tokio::test]
async fn memory_rolls_back_on_error() {
    rolls_back_on_error(memory_factory()).await;
}
