//! Folder CRUD and property reconciliation against IMAP STATUS and
//! SELECT/EXAMINE responses.

use crate::db::RwOutcome;
use crate::error::{StoreError, StoreResult};
use crate::model::{FolderAttributes, FolderId, FolderPath, FolderProperties, ImapFolderDescriptor};
use crate::store::path::fetch_folder_id;
use rusqlite::Transaction;

pub(crate) fn load_properties(tx: &Transaction, id: FolderId) -> StoreResult<FolderProperties> {
    let row: (String, i64, i64, i64, i64, i64) = tx.query_row(
        "SELECT attributes, last_seen_total, last_seen_status_total, uid_validity, uid_next, unread_count
         FROM FolderTable WHERE id = ?1",
        [id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
    )?;
    let attributes: FolderAttributes = serde_json::from_str(&row.0)?;
    Ok(FolderProperties {
        attributes,
        last_seen_total: row.1 as u32,
        last_seen_status_total: row.2 as u32,
        uid_validity: row.3,
        uid_next: row.4,
        unread_count: row.5 as u32,
    })
}

/// Ensure every ancestor row exists (creating with null counts), then insert
/// or update the leaf row with properties from `descriptor`.
pub(crate) fn clone_folder(
    tx: &Transaction,
    path: &FolderPath,
    descriptor: &ImapFolderDescriptor,
) -> StoreResult<FolderId> {
    let id = fetch_folder_id(tx, path, true)?
        .ok_or_else(|| StoreError::DatabaseCorruption(format!("loop creating {path}")))?;

    let attributes = serde_json::to_string(&FolderAttributes(descriptor.attrs.clone()))?;
    let unread = descriptor
        .email_unread
        .or(descriptor.unseen)
        .unwrap_or(0);
    tx.execute(
        "UPDATE FolderTable SET attributes = ?1,
             last_seen_total = COALESCE(?2, last_seen_total),
             last_seen_status_total = COALESCE(?3, last_seen_status_total),
             uid_validity = COALESCE(?4, uid_validity),
             uid_next = COALESCE(?5, uid_next),
             unread_count = ?6
         WHERE id = ?7",
        (
            attributes,
            descriptor.select_examine_messages,
            descriptor.status_messages,
            descriptor.uid_validity,
            descriptor.uid_next,
            unread,
            id,
        ),
    )?;
    Ok(id)
}

/// Delete a folder: rolls back (no-op) if the path does not resolve, or if
/// the folder has children. Otherwise deletes its location rows, then
/// itself; orphaned messages are left for a separate GC pass.
pub(crate) fn delete_folder(
    tx: &Transaction,
    path: &FolderPath,
) -> StoreResult<RwOutcome<bool>> {
    let Some(id) = fetch_folder_id(tx, path, false)? else {
        return Ok(RwOutcome::Rollback(false));
    };

    let has_children: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM FolderTable WHERE parent_id = ?1)",
        [id],
        |r| r.get(0),
    )?;
    if has_children {
        log::warn!("refusing to delete folder {path}: it has children");
        return Ok(RwOutcome::Rollback(false));
    }

    tx.execute("DELETE FROM MessageLocationTable WHERE folder_id = ?1", [id])?;
    tx.execute("DELETE FROM FolderTable WHERE id = ?1", [id])?;
    Ok(RwOutcome::Commit(true))
}

/// Reconcile from an IMAP STATUS response: updates `attributes`,
/// `unread_count`, `last_seen_status_total`, and (if `update_uid_info`)
/// `uid_validity`/`uid_next`. Never touches `last_seen_total`.
pub(crate) fn update_folder_status(
    tx: &Transaction,
    path: &FolderPath,
    descriptor: &ImapFolderDescriptor,
    update_uid_info: bool,
) -> StoreResult<FolderProperties> {
    let id = fetch_folder_id(tx, path, false)?
        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

    let attributes = serde_json::to_string(&FolderAttributes(descriptor.attrs.clone()))?;
    let unread = descriptor
        .email_unread
        .or(descriptor.unseen)
        .unwrap_or(0);
    let status_total = descriptor.status_messages.unwrap_or(0);

    if update_uid_info {
        tx.execute(
            "UPDATE FolderTable SET attributes = ?1, unread_count = ?2,
                 last_seen_status_total = ?3, uid_validity = ?4, uid_next = ?5
             WHERE id = ?6",
            (
                attributes,
                unread,
                status_total,
                descriptor.uid_validity.unwrap_or(0),
                descriptor.uid_next.unwrap_or(0),
                id,
            ),
        )?;
    } else {
        tx.execute(
            "UPDATE FolderTable SET attributes = ?1, unread_count = ?2, last_seen_status_total = ?3
             WHERE id = ?4",
            (attributes, unread, status_total, id),
        )?;
    }
    load_properties(tx, id)
}

/// Reconcile from an IMAP SELECT/EXAMINE response: updates `uid_validity`,
/// `uid_next`, and `last_seen_total`. Never touches `last_seen_status_total`.
pub(crate) fn update_folder_select_examine(
    tx: &Transaction,
    path: &FolderPath,
    descriptor: &ImapFolderDescriptor,
) -> StoreResult<FolderProperties> {
    let id = fetch_folder_id(tx, path, false)?
        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

    let total = descriptor.select_examine_messages.unwrap_or(0);
    tx.execute(
        "UPDATE FolderTable SET uid_validity = ?1, uid_next = ?2, last_seen_total = ?3
         WHERE id = ?4",
        (
            descriptor.uid_validity.unwrap_or(0),
            descriptor.uid_next.unwrap_or(0),
            total,
            id,
        ),
    )?;
    load_properties(tx, id)
}

/// Case-insensitive "is this some variant of INBOX" predicate, used by the
/// duplicate-Inbox cleanup on open.
pub(crate) fn is_inbox_like(name: &str) -> bool {
    name.eq_ignore_ascii_case("inbox")
}

/// Canonical spelling clients should converge on.
pub(crate) const CANONICAL_INBOX: &str = "INBOX";

/// Delete extra root folders that are case-variants of INBOX but not the
/// canonical spelling, keeping at most one.
pub(crate) fn cleanup_duplicate_inboxes(tx: &Transaction) -> StoreResult<()> {
    let mut stmt = tx.prepare(
        "SELECT id, name FROM FolderTable WHERE parent_id IS NULL",
    )?;
    let roots: Vec<(FolderId, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let duplicates: Vec<FolderId> = roots
        .iter()
        .filter(|(_, name)| is_inbox_like(name) && name != CANONICAL_INBOX)
        .map(|(id, _)| *id)
        .collect();

    for id in duplicates {
        tx.execute("DELETE FROM MessageLocationTable WHERE folder_id = ?1", [id])?;
        tx.execute("DELETE FROM FolderTable WHERE id = ?1", [id])?;
    }
    Ok(())
}
