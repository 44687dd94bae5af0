//! Execution context shared by the relational repositories.
//!
//! A repository bundle is bound either to the pool (each call checks out its
//! own connection) or to one open transaction (every call in the bundle runs
//! on the transaction's connection, one at a time).

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use jotter_core::Repositories;

use crate::error::{DbError, DbResult};

use super::note::SqlNoteRepository;
use super::query::{SqlNoteQueries, SqlTagQueries};
use super::revision::SqlRevisionRepository;
use super::tag::SqlTagRepository;

/// Shared slot of an open transaction; `None` once committed or rolled back.
pub type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

#[derive(Clone)]
pub enum SqlContext {
    Pool(SqlitePool),
    Transaction(SharedTransaction),
}

impl SqlContext {
    /// Borrows a connection for one repository call.
    pub(crate) async fn acquire(&self) -> DbResult<ConnGuard<'_>> {
        match self {
            SqlContext::Pool(pool) => Ok(ConnGuard::Pooled(pool.acquire().await?)),
            SqlContext::Transaction(tx) => {
                let guard = tx.lock().await;
                if guard.is_none() {
                    return Err(DbError::TransactionFailed(
                        "transaction already finished".to_string(),
                    ));
                }
                Ok(ConnGuard::Transaction(guard))
            }
        }
    }

    /// The pool, when calls are free to run on separate connections.
    pub(crate) fn pool(&self) -> Option<&SqlitePool> {
        match self {
            SqlContext::Pool(pool) => Some(pool),
            SqlContext::Transaction(_) => None,
        }
    }

    /// All five ports bound to this context.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            notes: Arc::new(SqlNoteRepository::new(self.clone())),
            tags: Arc::new(SqlTagRepository::new(self.clone())),
            revisions: Arc::new(SqlRevisionRepository::new(self.clone())),
            note_queries: Arc::new(SqlNoteQueries::new(self.clone())),
            tag_queries: Arc::new(SqlTagQueries::new(self.clone())),
        }
    }
}

/// A connection borrowed for one repository call.
pub(crate) enum ConnGuard<'a> {
    Pooled(PoolConnection<Sqlite>),
    Transaction(MutexGuard<'a, Option<Transaction<'static, Sqlite>>>),
}

impl ConnGuard<'_> {
    pub(crate) fn conn(&mut self) -> DbResult<&mut SqliteConnection> {
        match self {
            ConnGuard::Pooled(conn) => Ok(&mut **conn),
            ConnGuard::Transaction(guard) => match guard.as_mut() {
                Some(tx) => Ok(&mut **tx),
                None => Err(DbError::TransactionFailed(
                    "transaction already finished".to_string(),
                )),
            },
        }
    }
}
