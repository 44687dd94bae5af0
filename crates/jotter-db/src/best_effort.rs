//! Pass-through unit of work for backends without transactions.
//!
//! Every write commits as it happens. `commit` has nothing to do and
//! `rollback` can only report that earlier writes remain.

use async_trait::async_trait;
use tracing::warn;

use jotter_core::{
    Repositories, StoreResult, TransactionCapability, UnitOfWork, UnitOfWorkProvider,
};

/// Provider that hands out its repositories unchanged.
#[derive(Clone)]
pub struct BestEffortProvider {
    backend: &'static str,
    repos: Repositories,
}

impl BestEffortProvider {
    pub fn new(backend: &'static str, repos: Repositories) -> Self {
        BestEffortProvider { backend, repos }
    }

    pub fn repositories(&self) -> Repositories {
        self.repos.clone()
    }
}

#[async_trait]
impl UnitOfWorkProvider for BestEffortProvider {
    fn capability(&self) -> TransactionCapability {
        TransactionCapability::BestEffort
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(BestEffortUnitOfWork {
            backend: self.backend,
            repos: self.repos.clone(),
        }))
    }
}

struct BestEffortUnitOfWork {
    backend: &'static str,
    repos: Repositories,
}

#[async_trait]
impl UnitOfWork for BestEffortUnitOfWork {
    fn repositories(&self) -> Repositories {
        self.repos.clone()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        warn!(
            backend = self.backend,
            "Rollback requested on a best-effort backend; earlier writes remain"
        );
        Ok(())
    }
}
