//! Account Store: the public entry point. Owns the open/close lifecycle,
//! and fronts folder CRUD, message lookup, search, and unread propagation
//! with a single `NotOpen`-guarded API surface. Opening spins up the
//! unread-propagation and background-indexer tasks; closing cancels and
//! detaches them.

pub(crate) mod folder_crud;
pub(crate) mod message_lookup;
pub(crate) mod path;
pub(crate) mod unread;

use crate::db::{DatabaseGateway, RwOutcome};
use crate::error::{StoreError, StoreResult};
use crate::indexer::{self, ProgressMonitor};
use crate::model::{
    ContactRow, FolderBlacklistEntry, FolderId, FolderPath, FolderProperties, ImapFolderDescriptor,
    MessageRow, MessageRowId, SearchResultId,
};
use crate::registry::{FolderHandle, FolderRegistry, UnreadEvent};
use crate::search::execute;
use crate::store::path::{fetch_folder_id, fetch_parent_id, find_folder_path};
use crate::config::StoreConfig;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Virtual, non-IMAP folder paths the store maintains handles for: an
/// outbox (queued outgoing mail, drained by the out-of-scope SMTP sender)
/// and a search-results folder (the live result set of the most recent
/// `search`). Both are ordinary rows in `FolderTable`, just never reconciled
/// against a STATUS/SELECT response.
const OUTBOX_FOLDER: &str = "Outbox";
const SEARCH_FOLDER: &str = "Search";

/// Everything a per-call method needs, cheap to clone out of the `RwLock`
/// so the lock itself is held only for the duration of the clone.
#[derive(Clone)]
struct OpenHandles {
    db: DatabaseGateway,
    registry: FolderRegistry,
    cancel: CancellationToken,
    unread_tx: UnboundedSender<UnreadEvent>,
    outbox: FolderHandle,
    search_folder: FolderHandle,
}

/// Background task join handles, touched only by `open`/`close`.
struct TaskHandles {
    indexer: JoinHandle<()>,
    unread_propagation: JoinHandle<()>,
}

/// A single account's local mail store: folder tree, message cache, and
/// full-text search, backed by one SQLite database per account directory.
pub struct AccountStore {
    account_email: String,
    config: StoreConfig,
    handles: RwLock<Option<OpenHandles>>,
    tasks: Mutex<Option<TaskHandles>>,
    contacts: RwLock<Vec<ContactRow>>,
}

/// Resolve (creating if needed) and install a live handle for `path`,
/// reusing any handle already registered for it. Shared by `open()`'s
/// outbox/search-folder setup and the public `create_local_folder`.
async fn ensure_local_folder(
    db: &DatabaseGateway,
    registry: &FolderRegistry,
    unread_tx: &UnboundedSender<UnreadEvent>,
    path: FolderPath,
) -> StoreResult<FolderHandle> {
    let (id, properties) = db
        .read_write(None, {
            let path = path.clone();
            move |tx| {
                let id = fetch_folder_id(tx, &path, true)?
                    .ok_or_else(|| StoreError::DatabaseCorruption(format!("loop creating {path}")))?;
                let properties = folder_crud::load_properties(tx, id)?;
                Ok(RwOutcome::Commit((id, properties)))
            }
        })
        .await?;
    Ok(registry.create_local_folder(path, id, properties, unread_tx.clone()))
}

async fn load_contacts(db: &DatabaseGateway) -> StoreResult<Vec<ContactRow>> {
    db.read_only(None, |tx| {
        let mut stmt = tx.prepare(
            "SELECT email, real_name, highest_importance, normalized_email, flags FROM ContactTable",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(ContactRow {
                    email: r.get(0)?,
                    real_name: r.get(1)?,
                    highest_importance: r.get(2)?,
                    normalized_email: r.get(3)?,
                    flags: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
    .await
}

/// Drains unread-change reports and fans out the computed per-folder deltas
/// to whichever folders currently have a live handle. Folders with no live
/// handle have nothing to update in memory; their row-level `unread_count`
/// is refreshed the next time they are reconciled via STATUS/SELECT.
async fn unread_propagation_loop(
    db: DatabaseGateway,
    registry: FolderRegistry,
    mut events: UnboundedReceiver<UnreadEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let deltas = db
            .read_only(Some(&cancel), move |tx| {
                unread::compute_deltas_for_event(tx, &event)
            })
            .await;
        match deltas {
            Ok(deltas) => {
                for (path, delta) in deltas {
                    if let Some(handle) = registry.get_local_folder(&path) {
                        handle.apply_unread_delta(delta);
                    }
                }
            }
            Err(e) => log::warn!("unread propagation: failed to compute deltas: {e}"),
        }
    }
}

impl AccountStore {
    /// Construct a store for `account_email`, not yet open.
    pub fn new(account_email: impl Into<String>, config: StoreConfig) -> Self {
        AccountStore {
            account_email: account_email.into(),
            config,
            handles: RwLock::new(None),
            tasks: Mutex::new(None),
            contacts: RwLock::new(Vec::new()),
        }
    }

    async fn handles(&self) -> StoreResult<OpenHandles> {
        self.handles.read().await.clone().ok_or(StoreError::NotOpen)
    }

    /// Open the store: creates `data_dir` and its database file if missing,
    /// runs the duplicate-Inbox cleanup, loads contacts, constructs the
    /// outbox and search-folder collaborators, and starts the
    /// unread-propagation and background-indexer tasks. `schema_dir` is
    /// accepted for parity with the caller-facing signature but unused —
    /// this store embeds its DDL rather than loading migration files from
    /// disk. `progress` is notified of indexer activity; pass
    /// `Arc::new(NullProgressMonitor)` if the caller doesn't need it.
    pub async fn open(
        &self,
        data_dir: &Path,
        _schema_dir: &Path,
        progress: Arc<dyn ProgressMonitor>,
    ) -> StoreResult<()> {
        let mut handles_guard = self.handles.write().await;
        if handles_guard.is_some() {
            return Err(StoreError::AlreadyOpen);
        }

        let db = DatabaseGateway::open(data_dir, self.config.busy_timeout).await?;
        db.read_write(None, |tx| folder_crud::cleanup_duplicate_inboxes(tx).map(RwOutcome::Commit))
            .await?;

        let contacts = load_contacts(&db).await?;
        *self.contacts.write().await = contacts;

        let cancel = CancellationToken::new();
        let (unread_tx, unread_rx) = unbounded_channel();
        let registry = FolderRegistry::new();

        let outbox = ensure_local_folder(&db, &registry, &unread_tx, FolderPath::root(OUTBOX_FOLDER)).await?;
        let search_folder =
            ensure_local_folder(&db, &registry, &unread_tx, FolderPath::root(SEARCH_FOLDER)).await?;

        let unread_propagation = tokio::spawn(unread_propagation_loop(
            db.clone(),
            registry.clone(),
            unread_rx,
            cancel.clone(),
        ));
        let indexer_task = tokio::spawn(indexer::run(
            db.clone(),
            self.config.clone(),
            cancel.clone(),
            progress,
        ));

        *handles_guard = Some(OpenHandles { db, registry, cancel, unread_tx, outbox, search_folder });
        *self.tasks.lock().await = Some(TaskHandles {
            indexer: indexer_task,
            unread_propagation,
        });
        Ok(())
    }

    /// Close the store. Idempotent: a store that isn't open returns without
    /// doing anything. Cancels the background indexer's cancellation token
    /// (disconnecting the outbox/unread signals is implicit — dropping the
    /// held `OpenHandles` drops the last strong reference to the outbox and
    /// search folder handles, releasing them from the registry), and
    /// detaches the background tasks rather than waiting on them — they
    /// notice the cancellation and stop on their own next yield point.
    pub async fn close(&self) {
        let mut handles_guard = self.handles.write().await;
        let Some(handles) = handles_guard.take() else {
            return;
        };
        handles.cancel.cancel();
        handles.db.close();
        drop(handles_guard);

        if let Some(tasks) = self.tasks.lock().await.take() {
            tasks.indexer.abort();
            tasks.unread_propagation.abort();
        }
        self.contacts.write().await.clear();
    }

    /// Contacts loaded at open, refreshed only by a subsequent `open` call.
    pub async fn contacts(&self) -> Vec<ContactRow> {
        self.contacts.read().await.clone()
    }

    // --- Folder CRUD / reconciliation --------------------------------------

    pub async fn clone_folder(
        &self,
        path: FolderPath,
        descriptor: ImapFolderDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<FolderId> {
        let h = self.handles().await?;
        h.db
            .read_write(cancel, move |tx| {
                folder_crud::clone_folder(tx, &path, &descriptor).map(RwOutcome::Commit)
            })
            .await
    }

    pub async fn delete_folder(
        &self,
        path: FolderPath,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<bool> {
        let h = self.handles().await?;
        h.db
            .read_write(cancel, move |tx| folder_crud::delete_folder(tx, &path))
            .await
    }

    pub async fn update_folder_status(
        &self,
        path: FolderPath,
        descriptor: ImapFolderDescriptor,
        update_uid_info: bool,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<FolderProperties> {
        let h = self.handles().await?;
        let properties = h
            .db
            .read_write(cancel, {
                let path = path.clone();
                move |tx| {
                    folder_crud::update_folder_status(tx, &path, &descriptor, update_uid_info)
                        .map(RwOutcome::Commit)
                }
            })
            .await?;
        if let Some(handle) = h.registry.get_local_folder(&path) {
            handle.update_properties(properties.clone());
        }
        Ok(properties)
    }

    pub async fn update_folder_select_examine(
        &self,
        path: FolderPath,
        descriptor: ImapFolderDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<FolderProperties> {
        let h = self.handles().await?;
        let properties = h
            .db
            .read_write(cancel, {
                let path = path.clone();
                move |tx| {
                    folder_crud::update_folder_select_examine(tx, &path, &descriptor)
                        .map(RwOutcome::Commit)
                }
            })
            .await?;
        if let Some(handle) = h.registry.get_local_folder(&path) {
            handle.update_properties(properties.clone());
        }
        Ok(properties)
    }

    // --- Path resolution ----------------------------------------------------

    pub async fn fetch_folder_id(
        &self,
        path: FolderPath,
        create: bool,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<FolderId>> {
        let h = self.handles().await?;
        if create {
            h.db
                .read_write(cancel, move |tx| fetch_folder_id(tx, &path, true).map(RwOutcome::Commit))
                .await
        } else {
            h.db.read_only(cancel, move |tx| fetch_folder_id(tx, &path, false)).await
        }
    }

    pub async fn fetch_parent_id(
        &self,
        path: FolderPath,
        create: bool,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<FolderId>> {
        let h = self.handles().await?;
        if create {
            h.db
                .read_write(cancel, move |tx| fetch_parent_id(tx, &path, true).map(RwOutcome::Commit))
                .await
        } else {
            h.db.read_only(cancel, move |tx| fetch_parent_id(tx, &path, false)).await
        }
    }

    pub async fn find_folder_path(
        &self,
        folder_id: FolderId,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<FolderPath>> {
        let h = self.handles().await?;
        h.db.read_only(cancel, move |tx| find_folder_path(tx, folder_id)).await
    }

    // --- Folder handle registry ---------------------------------------------

    pub async fn get_local_folder(
        &self,
        path: &FolderPath,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<FolderHandle>> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        let h = self.handles().await?;
        Ok(h.registry.get_local_folder(path))
    }

    /// Resolve (creating if needed) and install a live handle for `path`,
    /// reusing any handle already registered for it.
    pub async fn create_local_folder(
        &self,
        path: FolderPath,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<FolderHandle> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        let h = self.handles().await?;
        ensure_local_folder(&h.db, &h.registry, &h.unread_tx, path).await
    }

    /// The outbox collaborator: queued outgoing mail, drained by the
    /// (external) SMTP sender.
    pub async fn outbox_folder(&self, cancel: Option<&CancellationToken>) -> StoreResult<FolderHandle> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        Ok(self.handles().await?.outbox)
    }

    /// The search-results collaborator: the live result set of the most
    /// recent `search` call, presented as an ordinary folder to callers.
    pub async fn search_folder(&self, cancel: Option<&CancellationToken>) -> StoreResult<FolderHandle> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        Ok(self.handles().await?.search_folder)
    }

    // --- Message lookup by Message-ID ---------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn search_message_id(
        &self,
        message_id: String,
        requested_fields: u32,
        partial_ok: bool,
        folder_blacklist: HashSet<FolderBlacklistEntry>,
        flag_blacklist: Option<HashSet<String>>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<Vec<(MessageRow, Vec<Option<FolderPath>>)>>> {
        let h = self.handles().await?;
        h.db
            .read_only(cancel, move |tx| {
                message_lookup::search_message_id(
                    tx,
                    &message_id,
                    requested_fields,
                    partial_ok,
                    &folder_blacklist,
                    flag_blacklist.as_ref(),
                )
            })
            .await
    }

    // --- Search --------------------------------------------------------------

    pub async fn search(
        &self,
        query: String,
        limit: u32,
        offset: u32,
        folder_blacklist: HashSet<FolderBlacklistEntry>,
        search_ids: Option<HashSet<i64>>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<Option<Vec<SearchResultId>>> {
        let h = self.handles().await?;
        let own_email = self.account_email.clone();
        h.db
            .read_only(cancel, move |tx| {
                execute::search(
                    tx,
                    &query,
                    &own_email,
                    limit,
                    offset,
                    &folder_blacklist,
                    search_ids.as_ref(),
                )
            })
            .await
    }

    pub async fn get_search_matches(
        &self,
        query: String,
        ids: HashSet<i64>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<HashSet<String>> {
        let h = self.handles().await?;
        let own_email = self.account_email.clone();
        h.db
            .read_only(cancel, move |tx| {
                execute::get_search_matches(tx, &query, &own_email, &ids)
            })
            .await
    }

    // --- Unread propagation trigger ------------------------------------------

    /// Report a batch of unread-status changes observed in `source_folder`.
    /// Equivalent to calling `FolderHandle::report_unread_changes` on that
    /// folder's handle, but usable even when the folder has no live handle.
    pub async fn report_unread_changes(
        &self,
        source_folder: FolderPath,
        changes: Vec<(MessageRowId, bool)>,
        cancel: Option<&CancellationToken>,
    ) -> StoreResult<()> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        let h = self.handles().await?;
        h.unread_tx
            .send(UnreadEvent { source_folder, changes })
            .map_err(|_| StoreError::TaskJoin("unread propagation task is gone".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::NullProgressMonitor;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn opened_store() -> (AccountStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let mut config = StoreConfig::default();
        // Keep the indexer out of the way of tests that don't exercise it.
        config.indexer_initial_delay = Duration::from_secs(3600);
        let store = AccountStore::new("me@example.com", config);
        store
            .open(dir.path(), dir.path(), Arc::new(NullProgressMonitor))
            .await
            .expect("open");
        (store, dir)
    }

    /// Insert a minimal message row and place it in `folder`, the way the
    /// (external) IMAP session layer would after a FETCH. Message ingestion
    /// itself is not a public operation of this crate, so the test seeds
    /// rows directly via the same `DatabaseGateway` the store itself uses.
    async fn seed_message(
        store: &AccountStore,
        message_id: &str,
        internaldate: i64,
        folder: &FolderPath,
    ) -> MessageRowId {
        let h = store.handles().await.expect("store is open");
        let folder = folder.clone();
        let message_id = message_id.to_string();
        h.db
            .read_write(None, move |tx| {
                let folder_id = fetch_folder_id(tx, &folder, true)?.expect("folder resolves");
                tx.execute(
                    "INSERT INTO MessageTable
                         (message_id, internaldate_time_t, subject, from_field, receivers, fields_bitmask)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (
                        &message_id,
                        internaldate,
                        "taxes for 2024",
                        "alice@example.com",
                        "me@example.com",
                        crate::model::INDEXING_FIELDS,
                    ),
                )?;
                let row_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO MessageLocationTable (message_id, folder_id, remove_marker) VALUES (?1, ?2, 0)",
                    (row_id, folder_id),
                )?;
                Ok(RwOutcome::Commit(row_id))
            })
            .await
            .expect("seed message")
    }

    /// Insert a message row with no location at all (an orphan) and return
    /// its row id.
    async fn seed_orphan_message(store: &AccountStore, message_id: &str) -> MessageRowId {
        let h = store.handles().await.expect("store is open");
        let message_id = message_id.to_string();
        h.db
            .read_write(None, move |tx| {
                tx.execute(
                    "INSERT INTO MessageTable
                         (message_id, internaldate_time_t, subject, from_field, receivers, fields_bitmask, flags)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    (
                        &message_id,
                        1_700_000_000i64,
                        "orphan",
                        "alice@example.com",
                        "me@example.com",
                        crate::model::INDEXING_FIELDS,
                        "[]",
                    ),
                )?;
                Ok(RwOutcome::Commit(tx.last_insert_rowid()))
            })
            .await
            .expect("seed orphan message")
    }

    /// Place an already-seeded message row into an additional folder.
    async fn place_in_folder(store: &AccountStore, row_id: MessageRowId, folder: &FolderPath) {
        let h = store.handles().await.expect("store is open");
        let folder = folder.clone();
        h.db
            .read_write(None, move |tx| {
                let folder_id = fetch_folder_id(tx, &folder, true)?.expect("folder resolves");
                tx.execute(
                    "INSERT INTO MessageLocationTable (message_id, folder_id, remove_marker) VALUES (?1, ?2, 0)",
                    (row_id, folder_id),
                )?;
                Ok(RwOutcome::Commit(()))
            })
            .await
            .expect("place in folder")
    }

    /// Set a message's stored flags (a JSON array of strings).
    async fn set_flags(store: &AccountStore, row_id: MessageRowId, flags: &[&str]) {
        let h = store.handles().await.expect("store is open");
        let flags = serde_json::to_string(flags).expect("serialize flags");
        h.db
            .read_write(None, move |tx| {
                tx.execute("UPDATE MessageTable SET flags = ?1 WHERE id = ?2", (flags, row_id))?;
                Ok(RwOutcome::Commit(()))
            })
            .await
            .expect("set flags")
    }

    #[tokio::test]
    async fn open_cleans_up_duplicate_inboxes() {
        let (store, _dir) = opened_store().await;
        let h = store.handles().await.unwrap();
        h.db
            .read_write(None, |tx| {
                tx.execute("INSERT INTO FolderTable (parent_id, name) VALUES (NULL, 'Inbox')", [])?;
                tx.execute("INSERT INTO FolderTable (parent_id, name) VALUES (NULL, 'INBOX')", [])?;
                Ok(RwOutcome::Commit(()))
            })
            .await
            .unwrap();
        h.db
            .read_write(None, |tx| folder_crud::cleanup_duplicate_inboxes(tx).map(RwOutcome::Commit))
            .await
            .unwrap();

        let roots: Vec<String> = h
            .db
            .read_only(None, |tx| {
                let mut stmt = tx.prepare("SELECT name FROM FolderTable WHERE parent_id IS NULL")?;
                Ok(stmt.query_map([], |r| r.get(0))?.collect::<Result<_, _>>()?)
            })
            .await
            .unwrap();
        assert_eq!(roots, vec!["INBOX".to_string()]);
        store.close().await;
    }

    #[tokio::test]
    async fn clone_folder_creates_hierarchy() {
        let (store, _dir) = opened_store().await;
        let path = FolderPath::root("A").child("B").child("C");
        let id = store
            .clone_folder(path.clone(), ImapFolderDescriptor::default(), None)
            .await
            .expect("clone_folder");

        let resolved = store.fetch_folder_id(path.clone(), false, None).await.unwrap();
        assert_eq!(resolved, Some(id));

        let found_path = store.find_folder_path(id, None).await.unwrap();
        assert_eq!(found_path, Some(path));
        store.close().await;
    }

    #[tokio::test]
    async fn not_open_guard_rejects_calls_before_open() {
        let store = AccountStore::new("me@example.com", StoreConfig::default());
        let err = store
            .fetch_folder_id(FolderPath::root("INBOX"), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotOpen));
    }

    #[tokio::test]
    async fn double_open_is_rejected() {
        let (store, dir) = opened_store().await;
        let err = store
            .open(dir.path(), dir.path(), Arc::new(NullProgressMonitor))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyOpen));
        store.close().await;
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_transaction_starts() {
        let (store, _dir) = opened_store().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = store
            .fetch_folder_id(FolderPath::root("INBOX"), true, Some(&cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        store.close().await;
    }

    #[tokio::test]
    async fn search_finds_message_by_field_token() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        let row_id = seed_message(&store, "<1@example.com>", 1_700_000_000, &inbox).await;

        // Index synchronously rather than waiting on the background task.
        let h = store.handles().await.unwrap();
        h.db
            .read_write(None, |tx| crate::indexer::populate_batch(tx, 10).map(RwOutcome::Commit))
            .await
            .unwrap();

        let results = store
            .search("subject:taxes".to_string(), 0, 0, HashSet::new(), None, None)
            .await
            .unwrap()
            .expect("a match");
        assert_eq!(results[0].row_id, row_id);
    }

    #[tokio::test]
    async fn unread_change_in_one_folder_propagates_to_sibling_locations() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        let archive = FolderPath::root("Archive");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        store.clone_folder(archive.clone(), ImapFolderDescriptor::default(), None).await.unwrap();

        let row_id = seed_message(&store, "<shared@example.com>", 1_700_000_000, &inbox).await;
        let h = store.handles().await.unwrap();
        let archive_id = fetch_folder_id_for_test(&h.db, &archive).await;
        h.db
            .read_write(None, move |tx| {
                tx.execute(
                    "INSERT INTO MessageLocationTable (message_id, folder_id, remove_marker) VALUES (?1, ?2, 0)",
                    (row_id, archive_id),
                )?;
                Ok(RwOutcome::Commit(()))
            })
            .await
            .unwrap();

        let archive_handle = store.create_local_folder(archive.clone(), None).await.unwrap();
        assert_eq!(archive_handle.properties().unread_count, 0);

        store
            .report_unread_changes(inbox.clone(), vec![(row_id, true)], None)
            .await
            .unwrap();

        // Give the unread-propagation task a chance to drain the event.
        for _ in 0..50 {
            if archive_handle.properties().unread_count == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(archive_handle.properties().unread_count, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn search_message_id_finds_basic_match() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        let row_id = seed_message(&store, "<basic@example.com>", 1_700_000_000, &inbox).await;

        let results = store
            .search_message_id(
                "<basic@example.com>".to_string(),
                0,
                true,
                HashSet::new(),
                None,
                None,
            )
            .await
            .unwrap()
            .expect("a match");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, row_id);
        assert_eq!(results[0].1, vec![Some(inbox)]);
    }

    #[tokio::test]
    async fn search_message_id_matches_in_reply_to_as_well() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        seed_message(&store, "<reply@example.com>", 1_700_000_000, &inbox).await;

        let h = store.handles().await.unwrap();
        h.db
            .read_write(None, |tx| {
                tx.execute(
                    "UPDATE MessageTable SET message_id = NULL, in_reply_to = '<original@example.com>'
                     WHERE message_id = '<reply@example.com>'",
                    [],
                )?;
                Ok(RwOutcome::Commit(()))
            })
            .await
            .unwrap();

        let results = store
            .search_message_id(
                "<original@example.com>".to_string(),
                0,
                true,
                HashSet::new(),
                None,
                None,
            )
            .await
            .unwrap()
            .expect("a match via in_reply_to");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_message_id_partial_ok_false_rejects_incomplete_rows() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        seed_message(&store, "<incomplete@example.com>", 1_700_000_000, &inbox).await;

        // `seed_message` only populates fields covered by `INDEXING_FIELDS`,
        // which does not include `IN_REPLY_TO`; requesting it with
        // `partial_ok = false` must reject the row.
        let result = store
            .search_message_id(
                "<incomplete@example.com>".to_string(),
                crate::model::MessageField::IN_REPLY_TO,
                false,
                HashSet::new(),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(result.is_none());

        let result = store
            .search_message_id(
                "<incomplete@example.com>".to_string(),
                crate::model::MessageField::SUBJECT,
                false,
                HashSet::new(),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn search_message_id_folder_blacklist_drops_whole_message() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        let archive = FolderPath::root("Archive");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        store.clone_folder(archive.clone(), ImapFolderDescriptor::default(), None).await.unwrap();

        // Seed into `inbox` first so it is collected into `paths` before the
        // blacklisted `archive` location is reached; a blacklist hit on
        // `archive` must discard the message entirely, not just that one
        // location.
        let row_id = seed_message(&store, "<multi@example.com>", 1_700_000_000, &inbox).await;
        place_in_folder(&store, row_id, &archive).await;

        let mut blacklist = HashSet::new();
        blacklist.insert(FolderBlacklistEntry::Path(archive.clone()));

        let result = store
            .search_message_id(
                "<multi@example.com>".to_string(),
                0,
                true,
                blacklist,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(result.is_none(), "blacklisted location must drop the whole message, including the earlier-collected inbox mapping");
    }

    #[tokio::test]
    async fn search_message_id_flag_blacklist_suppresses_match() {
        let (store, _dir) = opened_store().await;
        let inbox = FolderPath::root("INBOX");
        store.clone_folder(inbox.clone(), ImapFolderDescriptor::default(), None).await.unwrap();
        let row_id = seed_message(&store, "<flagged@example.com>", 1_700_000_000, &inbox).await;
        set_flags(&store, row_id, &["\\Deleted"]).await;

        let mut flag_blacklist = HashSet::new();
        flag_blacklist.insert("\\Deleted".to_string());

        let result = store
            .search_message_id(
                "<flagged@example.com>".to_string(),
                0,
                true,
                HashSet::new(),
                Some(flag_blacklist),
                None,
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn search_message_id_orphan_has_null_path() {
        let (store, _dir) = opened_store().await;
        seed_orphan_message(&store, "<orphan@example.com>").await;

        let results = store
            .search_message_id(
                "<orphan@example.com>".to_string(),
                0,
                true,
                HashSet::new(),
                None,
                None,
            )
            .await
            .unwrap()
            .expect("orphan still matches");
        assert_eq!(results[0].1, vec![None]);
    }

    #[tokio::test]
    async fn search_message_id_folderless_blacklist_drops_orphan() {
        let (store, _dir) = opened_store().await;
        seed_orphan_message(&store, "<orphan2@example.com>").await;

        let mut blacklist = HashSet::new();
        blacklist.insert(FolderBlacklistEntry::Folderless);

        let result = store
            .search_message_id(
                "<orphan2@example.com>".to_string(),
                0,
                true,
                blacklist,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    async fn fetch_folder_id_for_test(db: &DatabaseGateway, path: &FolderPath) -> FolderId {
        let path = path.clone();
        db.read_only(None, move |tx| Ok(fetch_folder_id(tx, &path, false)?.expect("folder exists")))
            .await
            .unwrap()
    }
}
