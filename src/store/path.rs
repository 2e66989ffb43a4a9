//! Folder path resolution: path segments to folder id and back, walking
//! `FolderTable`'s `parent_id` chain.

use crate::error::StoreResult;
use crate::model::{FolderId, FolderPath};
use rusqlite::{OptionalExtension, Transaction};

/// Walk `path` from root, looking up each segment by `(parent_id, name)`.
/// Creates missing segments with minimal rows when `create` is true.
/// Detects `id == parent_id` corruption and treats it as "not found".
pub(crate) fn fetch_folder_id(
    tx: &Transaction,
    path: &FolderPath,
    create: bool,
) -> StoreResult<Option<FolderId>> {
    let mut parent_id: Option<FolderId> = None;
    for segment in &path.0 {
        let existing: Option<FolderId> = match parent_id {
            Some(pid) => tx
                .query_row(
                    "SELECT id FROM FolderTable WHERE parent_id = ?1 AND name = ?2",
                    (pid, segment),
                    |row| row.get(0),
                )
                .optional()?,
            None => tx
                .query_row(
                    "SELECT id FROM FolderTable WHERE parent_id IS NULL AND name = ?1",
                    [segment],
                    |row| row.get(0),
                )
                .optional()?,
        };

        let id = match existing {
            Some(id) => id,
            None if create => {
                tx.execute(
                    "INSERT INTO FolderTable (parent_id, name) VALUES (?1, ?2)",
                    (parent_id, segment),
                )?;
                let new_id = tx.last_insert_rowid();
                if Some(new_id) == parent_id {
                    log::error!("loop in database: folder {new_id} is its own parent");
                    return Ok(None);
                }
                new_id
            }
            None => return Ok(None),
        };
        parent_id = Some(id);
    }
    Ok(parent_id)
}

/// `fetch_folder_id` for a path's parent; `None` when `path` is root.
pub(crate) fn fetch_parent_id(
    tx: &Transaction,
    path: &FolderPath,
    create: bool,
) -> StoreResult<Option<FolderId>> {
    match path.parent() {
        Some(parent) => fetch_folder_id(tx, &parent, create),
        None => Ok(None),
    }
}

/// Reconstruct a folder's path by walking `parent_id` pointers upward.
/// Detects self-parent loops the same way `fetch_folder_id` does.
pub(crate) fn find_folder_path(
    tx: &Transaction,
    folder_id: FolderId,
) -> StoreResult<Option<FolderPath>> {
    let mut segments = Vec::new();
    let mut current = folder_id;
    loop {
        let row: Option<(String, Option<FolderId>)> = tx
            .query_row(
                "SELECT name, parent_id FROM FolderTable WHERE id = ?1",
                [current],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((name, parent_id)) = row else {
            return Ok(None);
        };
        segments.push(name);
        match parent_id {
            Some(pid) if pid == current => {
                log::error!("loop in database: folder {current} is its own parent");
                return Ok(None);
            }
            Some(pid) => current = pid,
            None => break,
        }
    }
    segments.reverse();
    Ok(Some(FolderPath(segments)))
}
