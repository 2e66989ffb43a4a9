//! Cross-folder unread propagation: a message moved to/from unread in one
//! folder affects the cached unread count of every other folder that also
//! holds it.

use crate::error::StoreResult;
use crate::model::{FolderId, FolderPath, MessageRowId};
use crate::registry::UnreadEvent;
use crate::store::path::{fetch_folder_id, find_folder_path};
use rusqlite::Transaction;
use std::collections::HashMap;

/// For each changed message, find every folder currently containing it
/// (tombstones included — a pending-removal location still counts until the
/// removal actually commits), drop the source folder from that set, and
/// accumulate a signed delta per remaining folder.
pub(crate) fn compute_unread_deltas(
    tx: &Transaction,
    source_folder: &FolderPath,
    changes: &[(MessageRowId, bool)],
) -> StoreResult<Vec<(FolderPath, i64)>> {
    let source_id = fetch_folder_id(tx, source_folder, false)?;

    let mut by_folder: HashMap<FolderId, i64> = HashMap::new();
    for &(message_id, now_unread) in changes {
        let mut stmt =
            tx.prepare("SELECT folder_id FROM MessageLocationTable WHERE message_id = ?1")?;
        let folder_ids: Vec<FolderId> = stmt
            .query_map([message_id], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let delta = if now_unread { 1 } else { -1 };
        for folder_id in folder_ids {
            if Some(folder_id) == source_id {
                continue;
            }
            *by_folder.entry(folder_id).or_insert(0) += delta;
        }
    }

    let mut out = Vec::with_capacity(by_folder.len());
    for (folder_id, delta) in by_folder {
        if let Some(path) = find_folder_path(tx, folder_id)? {
            out.push((path, delta));
        }
    }
    Ok(out)
}

/// Unpack an `UnreadEvent` the same way.
pub(crate) fn compute_deltas_for_event(
    tx: &Transaction,
    event: &UnreadEvent,
) -> StoreResult<Vec<(FolderPath, i64)>> {
    compute_unread_deltas(tx, &event.source_folder, &event.changes)
}
