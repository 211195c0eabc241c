//! Persistence boundary for the domain layer
//!
//! Contains:
//! - `UnitOfWork`: one storage transaction plus the repositories bound to it
//! - `UnitOfWorkFactory`: opens a new unit of work per logical operation
//! - `DomainResult`: standard result type for domain operations

use std::fmt;

use async_trait::async_trait;

use super::allocation::BatchRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

// ── UnitOfWork ──────────────────────────────────────────────────

/// Lifecycle of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// Created, no transaction open yet
    Idle,
    /// Transaction open, repositories usable
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// A single storage transaction and the repositories bound to it.
///
/// Dropping an active unit of work rolls it back; nothing is persisted
/// unless `commit` succeeds.
///
/// ```ignore
/// let mut uow = factory.begin().await?;
/// let batch = uow.batches()?.get("batch1").await?;
/// batch.allocate(OrderLine::new("order1", "SKU1", 10))?;
/// uow.commit().await?;
/// ```
#[async_trait]
pub trait UnitOfWork: Send {
    /// Fails with `InvalidState` unless the unit of work is active.
    fn batches(&mut self) -> DomainResult<&mut dyn BatchRepository>;

    /// Write back every seen aggregate and commit. Fails with `InvalidState`
    /// when not active; any storage failure rolls back and surfaces as
    /// `Commit`.
    async fn commit(&mut self) -> DomainResult<()>;

    /// Discard everything done in this scope. A no-op unless active.
    async fn rollback(&mut self) -> DomainResult<()>;

    fn state(&self) -> UnitOfWorkState;
}

/// Opens units of work. One per logical operation; never shared.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> DomainResult<Box<dyn UnitOfWork>>;
}

/// Shared guard for operations that need an active unit of work.
pub fn ensure_active(state: UnitOfWorkState, operation: &str) -> DomainResult<()> {
    if state == UnitOfWorkState::Active {
        Ok(())
    } else {
        Err(DomainError::InvalidState(format!(
            "cannot {} a unit of work that is {}",
            operation, state
        )))
    }
}
