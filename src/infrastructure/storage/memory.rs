//! In-memory storage implementation
//!
//! A `DashMap` of committed batches shared by every unit of work opened on
//! the same store. Units of work read copies and only publish them on
//! commit, so uncommitted work is invisible to everyone else.
//!
//! Every stored batch carries a version. A unit of work remembers the
//! version of each batch it read (or that a batch it added was absent) and
//! the commit is refused if any of them changed in the meantime, the same
//! outcome a primary key or a lost update would produce in a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::domain::{
    ensure_active, Batch, BatchRepository, DomainError, DomainResult, SeenBatches, UnitOfWork,
    UnitOfWorkFactory, UnitOfWorkState,
};

const BACKEND: &str = "memory";

#[derive(Clone)]
struct Stored {
    batch: Batch,
    version: u64,
}

/// Committed state, for development and testing
#[derive(Default)]
pub struct InMemoryStore {
    batches: DashMap<String, Stored>,
    /// Serialises commits so the version check and the writes are atomic.
    commit_lock: Mutex<()>,
    commits: AtomicU64,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Committed copy of a batch.
    pub fn snapshot(&self, reference: &str) -> Option<Batch> {
        self.batches.get(reference).map(|s| s.batch.clone())
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every following commit fail as a storage engine would on a
    /// constraint or I/O error.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn load(&self, reference: &str) -> Option<Stored> {
        self.batches.get(reference).map(|s| s.value().clone())
    }

    fn all_sorted(&self) -> Vec<Stored> {
        let mut all: Vec<Stored> = self.batches.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.batch.reference().cmp(b.batch.reference()));
        all
    }

    /// Write `batches` if every one of them is still at the version the
    /// unit of work read (`None`: must not exist yet). All or nothing.
    fn publish<'a>(
        &self,
        batches: impl IntoIterator<Item = &'a Batch>,
        read_versions: &HashMap<String, Option<u64>>,
    ) -> DomainResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(DomainError::Commit("in-memory store refused the commit".to_string()));
        }

        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| DomainError::Commit("in-memory store lock poisoned".to_string()))?;

        let batches: Vec<&Batch> = batches.into_iter().collect();
        for b in &batches {
            let expected = read_versions.get(b.reference()).copied().flatten();
            let current = self.batches.get(b.reference()).map(|s| s.version);
            if current != expected {
                return Err(DomainError::Commit(match expected {
                    None => format!("batch '{}' was added concurrently", b.reference()),
                    Some(_) => format!("batch '{}' was modified concurrently", b.reference()),
                }));
            }
        }

        for b in batches {
            let version = read_versions.get(b.reference()).copied().flatten().map_or(1, |v| v + 1);
            self.batches.insert(
                b.reference().to_string(),
                Stored {
                    batch: b.clone(),
                    version,
                },
            );
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Repository ──────────────────────────────────────────────────

/// Fake repository over an `InMemoryStore`; same contract as the SeaORM one.
pub struct InMemoryBatchRepository {
    store: Arc<InMemoryStore>,
    seen: SeenBatches,
    /// Version each seen batch had when first read; `None` for added ones.
    read_versions: HashMap<String, Option<u64>>,
}

impl InMemoryBatchRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            seen: SeenBatches::new(),
            read_versions: HashMap::new(),
        }
    }

    fn track_stored(&mut self, stored: Stored) {
        self.read_versions
            .entry(stored.batch.reference().to_string())
            .or_insert(Some(stored.version));
        self.seen.track(stored.batch);
    }

    fn discard(&mut self) {
        self.seen.clear();
        self.read_versions.clear();
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn add(&mut self, batch: Batch) -> DomainResult<()> {
        if self.seen.contains(batch.reference()) || self.store.batches.contains_key(batch.reference()) {
            return Err(DomainError::DuplicateKey(format!(
                "Batch '{}' already exists",
                batch.reference()
            )));
        }
        self.read_versions.insert(batch.reference().to_string(), None);
        self.seen.track(batch);
        Ok(())
    }

    async fn get(&mut self, reference: &str) -> DomainResult<&mut Batch> {
        if !self.seen.contains(reference) {
            let stored = self
                .store
                .load(reference)
                .ok_or_else(|| DomainError::batch_not_found(reference))?;
            self.track_stored(stored);
        }

        self.seen
            .get_mut(reference)
            .ok_or_else(|| DomainError::batch_not_found(reference))
    }

    async fn list(&mut self) -> DomainResult<Vec<&mut Batch>> {
        for stored in self.store.all_sorted() {
            self.track_stored(stored);
        }
        Ok(self.seen.iter_mut().collect())
    }

    fn seen(&self) -> Vec<&Batch> {
        self.seen.iter().collect()
    }
}

// ── Unit of work ────────────────────────────────────────────────

pub struct InMemoryUnitOfWork {
    store: Arc<InMemoryStore>,
    batches: InMemoryBatchRepository,
    state: UnitOfWorkState,
}

impl InMemoryUnitOfWork {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            batches: InMemoryBatchRepository::new(store.clone()),
            store,
            state: UnitOfWorkState::Idle,
        }
    }

    pub fn begin(&mut self) -> DomainResult<()> {
        if self.state != UnitOfWorkState::Idle {
            return Err(DomainError::InvalidState(format!(
                "cannot begin a unit of work that is {}",
                self.state
            )));
        }
        self.state = UnitOfWorkState::Active;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn batches(&mut self) -> DomainResult<&mut dyn BatchRepository> {
        ensure_active(self.state, "use")?;
        Ok(&mut self.batches)
    }

    async fn commit(&mut self) -> DomainResult<()> {
        ensure_active(self.state, "commit")?;

        let result = self
            .store
            .publish(self.batches.seen.iter(), &self.batches.read_versions);
        match result {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                metrics::counter!("uow_commits_total", "backend" => BACKEND).increment(1);
                info!(batches = self.batches.seen.len(), "Unit of work committed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Commit failed, rolling back");
                metrics::counter!("uow_commit_failures_total", "backend" => BACKEND)
                    .increment(1);
                self.rollback().await?;
                Err(err)
            }
        }
    }

    async fn rollback(&mut self) -> DomainResult<()> {
        if self.state != UnitOfWorkState::Active {
            debug!(state = %self.state, "Rollback ignored");
            return Ok(());
        }
        self.batches.discard();
        self.state = UnitOfWorkState::RolledBack;
        metrics::counter!("uow_rollbacks_total", "backend" => BACKEND).increment(1);
        debug!("Unit of work rolled back");
        Ok(())
    }

    fn state(&self) -> UnitOfWorkState {
        self.state
    }
}

/// Opens `InMemoryUnitOfWork`s on one shared store.
#[derive(Clone, Default)]
pub struct InMemoryUnitOfWorkFactory {
    store: Arc<InMemoryStore>,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    async fn begin(&self) -> DomainResult<Box<dyn UnitOfWork>> {
        let mut uow = InMemoryUnitOfWork::new(self.store.clone());
        uow.begin()?;
        Ok(Box::new(uow))
    }
}
