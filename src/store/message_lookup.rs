//! Message lookup by Message-ID (and by being the subject of an In-Reply-To
//! reference), returning a multimap from matching row to the folders that
//! currently contain it.

use crate::error::StoreResult;
use crate::model::{FolderBlacklistEntry, FolderPath, MessageRow};
use crate::store::path::find_folder_path;
use rusqlite::Transaction;
use std::collections::HashSet;

fn row_from_sql(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    let flags_json: String = row.get("flags")?;
    let flags: HashSet<String> = serde_json::from_str(&flags_json).unwrap_or_default();
    Ok(MessageRow {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        in_reply_to: row.get("in_reply_to")?,
        internaldate_time_t: row.get("internaldate_time_t")?,
        subject: row.get("subject")?,
        from_field: row.get("from_field")?,
        receivers: row.get("receivers")?,
        cc: row.get("cc")?,
        bcc: row.get("bcc")?,
        body: row.get("body")?,
        attachment: row.get("attachment")?,
        flags,
        fields_bitmask: row.get("fields_bitmask")?,
    })
}

/// `search_message_id`: returns a multimap from message row to the set of
/// folder paths containing it (an entry of `None` denotes "orphan,
/// currently in no folder"). `None` overall means the result is empty.
pub(crate) fn search_message_id(
    tx: &Transaction,
    message_id: &str,
    requested_fields: u32,
    partial_ok: bool,
    folder_blacklist: &HashSet<FolderBlacklistEntry>,
    flag_blacklist: Option<&HashSet<String>>,
) -> StoreResult<Option<Vec<(MessageRow, Vec<Option<FolderPath>>)>>> {
    let mut stmt = tx.prepare(
        "SELECT * FROM MessageTable WHERE message_id = ?1 OR in_reply_to = ?1",
    )?;
    let rows: Vec<MessageRow> = stmt
        .query_map([message_id], row_from_sql)?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let mut out = Vec::new();
    'rows: for message in rows {
        if !partial_ok && !message.satisfies(requested_fields) {
            continue;
        }

        if let Some(flags) = flag_blacklist {
            if message.flags.intersection(flags).next().is_some() {
                continue;
            }
        }

        let mut stmt = tx.prepare(
            "SELECT folder_id FROM MessageLocationTable WHERE message_id = ?1 AND remove_marker = 0",
        )?;
        let folder_ids: Vec<i64> = stmt
            .query_map([message.id], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        if folder_ids.is_empty() {
            if folder_blacklist.contains(&FolderBlacklistEntry::Folderless) {
                continue;
            }
            out.push((message, vec![None]));
            continue;
        }

        let mut paths = Vec::with_capacity(folder_ids.len());
        for folder_id in folder_ids {
            let Some(path) = find_folder_path(tx, folder_id)? else {
                continue;
            };
            if folder_blacklist.contains(&FolderBlacklistEntry::Path(path.clone())) {
                continue 'rows;
            }
            paths.push(Some(path));
        }
        out.push((message, paths));
    }

    if out.is_empty() {
        Ok(None)
    } else {
        Ok(Some(out))
    }
}
