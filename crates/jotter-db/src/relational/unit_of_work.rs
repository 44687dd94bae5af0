//! Atomic unit of work over one sqlx transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::debug;

use jotter_core::{
    Repositories, StoreResult, TransactionCapability, UnitOfWork, UnitOfWorkProvider,
};

use crate::error::{DbError, DbResult};

use super::context::{SharedTransaction, SqlContext};

/// Opens transactions on the relational pool.
#[derive(Clone)]
pub struct RelationalProvider {
    pool: SqlitePool,
}

impl RelationalProvider {
    pub fn new(pool: SqlitePool) -> Self {
        RelationalProvider { pool }
    }

    /// Repositories outside any transaction.
    pub fn repositories(&self) -> Repositories {
        SqlContext::Pool(self.pool.clone()).repositories()
    }

    async fn open(&self) -> DbResult<RelationalUnitOfWork> {
        let tx = self.pool.begin().await?;
        let shared: SharedTransaction = Arc::new(Mutex::new(Some(tx)));
        let repos = SqlContext::Transaction(shared.clone()).repositories();

        debug!("Transaction started");
        Ok(RelationalUnitOfWork { tx: shared, repos })
    }
}

#[async_trait]
impl UnitOfWorkProvider for RelationalProvider {
    fn capability(&self) -> TransactionCapability {
        TransactionCapability::Atomic
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(self.open().await?))
    }
}

/// An open transaction and the repositories bound to it.
///
/// Dropping it without commit rolls the transaction back.
pub struct RelationalUnitOfWork {
    tx: SharedTransaction,
    repos: Repositories,
}

impl RelationalUnitOfWork {
    async fn finish(self, commit: bool) -> DbResult<()> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| DbError::TransactionFailed("transaction already finished".into()))?;

        if commit {
            tx.commit().await?;
            debug!("Transaction committed");
        } else {
            tx.rollback().await?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for RelationalUnitOfWork {
    fn repositories(&self) -> Repositories {
        self.repos.clone()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        Ok(self.finish(true).await?)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(self.finish(false).await?)
    }
}
