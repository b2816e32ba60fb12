//! In-process relational store. Rows live in an arena keyed by integer IDs; composite
//! writes go through [`Transaction`], which publishes its working copy on `commit` and
//! discards it on drop.

pub mod rows;
mod tables;

use std::ops::{Deref, DerefMut};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

pub use rows::{
    Applicant, ApplicantId, AssignMode, AutoAssignRule, Company, CompanyId, Frequency,
    NewApplicant, NewSchedule, PipelineEvent, Schedule, ScheduleId, SelectStatus, SelectStatusId,
    Team, TeamId, User, UserId,
};
pub use tables::Tables;

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{entity} with the same {field} already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
    },
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Single source of truth for every tenant's rows.
#[derive(Debug, Default)]
pub struct Database {
    tables: Mutex<Tables>,
}

pub type ReadView<'a> = MutexGuard<'a, Tables>;

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Consistent read view; writers wait until it is dropped.
    pub async fn read(&self) -> ReadView<'_> {
        self.tables.lock().await
    }

    /// Opens a serializable unit of work over a private copy of the tables.
    pub async fn begin(&self) -> Transaction<'_> {
        let guard = self.tables.lock().await;
        let working = guard.clone();
        Transaction {
            guard,
            working,
            committed: false,
        }
    }
}

/// Scoped write access. Dropping without [`Transaction::commit`] rolls back.
pub struct Transaction<'a> {
    guard: MutexGuard<'a, Tables>,
    working: Tables,
    committed: bool,
}

impl Transaction<'_> {
    pub fn commit(mut self) {
        std::mem::swap(&mut *self.guard, &mut self.working);
        self.committed = true;
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Self::Target {
        &self.working
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.working
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let database = Database::new();
        {
            let mut tx = database.begin().await;
            tx.insert_company("Acme").expect("insert");
        }
        let view = database.read().await;
        assert!(view.company(CompanyId(1)).is_none());
    }

    #[tokio::test]
    async fn committed_transaction_publishes_writes() {
        let database = Database::new();
        let mut tx = database.begin().await;
        let id = tx.insert_company("Acme").expect("insert");
        tx.commit();

        let view = database.read().await;
        assert_eq!(view.company(id).map(|c| c.name.as_str()), Some("Acme"));
    }

    #[tokio::test]
    async fn duplicate_company_names_are_rejected() {
        let database = Database::new();
        let mut tx = database.begin().await;
        tx.insert_company("Acme").expect("insert");
        assert!(matches!(
            tx.insert_company("Acme"),
            Err(StoreError::Duplicate {
                entity: "company",
                ..
            })
        ));
    }
}
