//! Batch repository interface

use std::collections::btree_map::{self, BTreeMap};

use async_trait::async_trait;

use super::model::Batch;
use crate::domain::DomainResult;

/// Collection-like access to `Batch` aggregates inside one unit of work.
///
/// Every batch handed out or added is tracked, so the owning unit of work
/// can write it back on commit whether or not the caller mutated it.
/// Repositories never commit.
#[async_trait]
pub trait BatchRepository: Send {
    /// Register a new batch. Fails with `DuplicateKey` if the reference is
    /// already stored or was already added in this scope.
    async fn add(&mut self, batch: Batch) -> DomainResult<()>;

    /// Fails with `NotFound` if no batch has this reference.
    async fn get(&mut self, reference: &str) -> DomainResult<&mut Batch>;

    /// All batches, ordered by reference.
    async fn list(&mut self) -> DomainResult<Vec<&mut Batch>>;

    /// Batches fetched or added during this scope.
    fn seen(&self) -> Vec<&Batch>;
}

/// Identity map of the batches a repository has handed out.
#[derive(Debug, Default)]
pub struct SeenBatches {
    batches: BTreeMap<String, Batch>,
}

impl SeenBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.batches.contains_key(reference)
    }

    pub fn get_mut(&mut self, reference: &str) -> Option<&mut Batch> {
        self.batches.get_mut(reference)
    }

    /// Track `batch` unless an instance with the same reference is already
    /// tracked; the tracked instance wins so in-scope mutations survive.
    pub fn track(&mut self, batch: Batch) -> &mut Batch {
        match self.batches.entry(batch.reference().to_string()) {
            btree_map::Entry::Occupied(entry) => entry.into_mut(),
            btree_map::Entry::Vacant(entry) => entry.insert(batch),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Batch> {
        self.batches.values_mut()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}
