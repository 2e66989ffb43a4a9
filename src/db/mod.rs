//! Database Gateway: owns the single embedded SQLite connection, serializes
//! all access through read-only and read-write transaction callbacks, and
//! runs schema setup on open.
//!
//! The connection lives behind a blocking `std::sync::Mutex` and all SQL
//! runs inside `tokio::task::spawn_blocking`, so the only `.await` point for
//! a transaction is the handoff to that blocking task. Every transaction
//! checks an optional `CancellationToken` immediately before it starts, so a
//! cancellation request lands at the next transaction boundary rather than
//! mid-statement.

pub(crate) mod schema;

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a read-write transaction callback: whether the store commits
/// or rolls back, carrying a caller-chosen value either way (so rollback can
/// be reported to the caller as a normal return rather than an error).
pub enum RwOutcome<T> {
    Commit(T),
    Rollback(T),
}

#[derive(Clone)]
pub(crate) struct DatabaseGateway {
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseGateway {
    /// Open (creating the directory and file if missing) and run a
    /// corruption check before handing back a gateway.
    pub(crate) async fn open(data_dir: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let data_dir = data_dir.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                StoreError::BadParameters(format!("cannot create data directory: {e}"))
            })?;
            let db_path: PathBuf = data_dir.join("mail-store.db");
            let conn = Connection::open_with_flags(
                &db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;

            let integrity: String =
                conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            if integrity != "ok" {
                return Err(StoreError::DatabaseCorruption(integrity));
            }

            schema::init_db(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))??;

        Ok(DatabaseGateway {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Drops the connection. Idempotent from the caller's point of view:
    /// the `AccountStore` only ever calls this once per `open()`, guarded by
    /// its own `is_open` flag.
    pub(crate) fn close(&self) {
        // Dropping the last Arc strong ref closes the underlying connection;
        // the gateway itself holds no other resources.
    }

    /// Run a read-write transaction. The callback decides commit vs.
    /// rollback; both paths return normally to the caller. If `cancel` is
    /// already cancelled, the transaction never starts and this returns
    /// `StoreError::Cancelled`.
    pub(crate) async fn read_write<F, T>(
        &self,
        cancel: Option<&CancellationToken>,
        f: F,
    ) -> StoreResult<T>
    where
        F: FnOnce(&Transaction) -> StoreResult<RwOutcome<T>> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("db mutex poisoned");
            let tx = guard.transaction()?;
            match f(&tx)? {
                RwOutcome::Commit(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                RwOutcome::Rollback(value) => {
                    // Explicit for clarity; dropping `tx` without commit()
                    // rolls back on its own.
                    tx.rollback()?;
                    Ok(value)
                }
            }
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }

    /// Run a read-only transaction: reads observe one consistent snapshot.
    /// If `cancel` is already cancelled, the transaction never starts and
    /// this returns `StoreError::Cancelled`.
    pub(crate) async fn read_only<F, T>(
        &self,
        cancel: Option<&CancellationToken>,
        f: F,
    ) -> StoreResult<T>
    where
        F: FnOnce(&Transaction) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("db mutex poisoned");
            let tx = guard.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}
