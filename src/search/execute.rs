//! Search execution and match extraction.

use crate::error::StoreResult;
use crate::model::{FolderBlacklistEntry, SearchResultId};
use crate::search::compiler::{self, FIELD_ANY};
use crate::store::path::fetch_folder_id;
use rusqlite::Transaction;
use std::collections::HashSet;

/// FTS column order, matching `MessageSearchTable`'s `CREATE VIRTUAL TABLE`
/// column list — `offsets()` reports column indices against this order.
const FTS_COLUMNS: &[&str] = &["subject", "from_field", "receivers", "cc", "bcc", "body", "attachment"];

fn match_expression(compiled: &compiler::CompiledQuery) -> String {
    compiled
        .phrases
        .iter()
        .map(|(field, phrase)| {
            if field == FIELD_ANY {
                phrase.clone()
            } else {
                format!("{field}:{phrase}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a folder blacklist to a `SELECT message_id ...` sub-query,
/// creating folder rows for unresolved paths as a side effect.
fn blacklist_subselect(
    tx: &Transaction,
    blacklist: &HashSet<FolderBlacklistEntry>,
) -> StoreResult<String> {
    if blacklist.is_empty() {
        return Ok(String::new());
    }

    let mut folder_ids = Vec::new();
    let mut folderless = false;
    for entry in blacklist {
        match entry {
            FolderBlacklistEntry::Path(path) => {
                if let Some(id) = fetch_folder_id(tx, path, true)? {
                    folder_ids.push(id);
                }
            }
            FolderBlacklistEntry::Folderless => folderless = true,
        }
    }

    let mut parts = Vec::new();
    if !folder_ids.is_empty() {
        let ids = folder_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!(
            "SELECT message_id FROM MessageLocationTable WHERE remove_marker = 0 AND folder_id IN ({ids})"
        ));
    }
    if folderless {
        parts.push(
            "SELECT id FROM MessageTable WHERE id NOT IN \
             (SELECT message_id FROM MessageLocationTable WHERE remove_marker = 0)"
                .to_string(),
        );
    }
    Ok(parts.join(" UNION "))
}

/// `search`: returns result identifiers ordered by internal date descending,
/// or `None` if nothing matched.
#[allow(clippy::too_many_arguments)]
pub(crate) fn search(
    tx: &Transaction,
    query: &str,
    own_email: &str,
    limit: u32,
    offset: u32,
    folder_blacklist: &HashSet<FolderBlacklistEntry>,
    search_ids: Option<&HashSet<i64>>,
) -> StoreResult<Option<Vec<SearchResultId>>> {
    let compiled = compiler::compile(query, own_email);
    if compiled.is_empty() {
        return Ok(None);
    }

    let match_expr = match_expression(&compiled);
    let blacklist_sql = blacklist_subselect(tx, folder_blacklist)?;

    let mut sql = String::from(
        "SELECT id, internaldate_time_t FROM MessageTable INDEXED BY idx_message_internaldate \
         WHERE id IN (SELECT docid FROM MessageSearchTable WHERE MessageSearchTable MATCH ?1)",
    );
    if !blacklist_sql.is_empty() {
        sql.push_str(&format!(" AND id NOT IN ({blacklist_sql})"));
    }
    if let Some(ids) = search_ids {
        let list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        sql.push_str(&format!(" AND id IN ({list})"));
    }
    sql.push_str(" ORDER BY internaldate_time_t DESC");
    if limit != 0 {
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }

    let mut stmt = tx.prepare(&sql)?;
    let results: Vec<SearchResultId> = stmt
        .query_map([&match_expr], |row| {
            Ok(SearchResultId {
                row_id: row.get(0)?,
                internaldate_time_t: row.get(1)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    if results.is_empty() {
        Ok(None)
    } else {
        Ok(Some(results))
    }
}

/// Parse an FTS4 `offsets()` string into `(column, byte_offset, size)`
/// quadruples (the `term` field is unused). Malformed input yields no
/// matches rather than an error.
fn parse_offsets(raw: &str) -> Vec<(usize, usize, usize)> {
    let nums: Vec<i64> = raw
        .split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .collect();
    nums.chunks_exact(4)
        .filter_map(|q| {
            let column = usize::try_from(q[0]).ok()?;
            let byte_offset = usize::try_from(q[2]).ok()?;
            let size = usize::try_from(q[3]).ok()?;
            Some((column, byte_offset, size))
        })
        .collect()
}

/// `get_search_matches`: literal substrings responsible for each match, for
/// UI highlighting, plus a "fudge factor" of literal words from the raw
/// query that the tokenizer would have discarded.
pub(crate) fn get_search_matches(
    tx: &Transaction,
    query: &str,
    own_email: &str,
    ids: &HashSet<i64>,
) -> StoreResult<HashSet<String>> {
    let compiled = compiler::compile(query, own_email);
    let mut out = HashSet::new();
    if !compiled.is_empty() {
        let match_expr = match_expression(&compiled);
        let sql = "SELECT docid, offsets(MessageSearchTable), subject, from_field, receivers, \
                   cc, bcc, body, attachment FROM MessageSearchTable WHERE MessageSearchTable MATCH ?1";
        let mut stmt = tx.prepare(sql)?;
        let mut rows = stmt.query([&match_expr])?;
        while let Some(row) = rows.next()? {
            let docid: i64 = row.get(0)?;
            if !ids.contains(&docid) {
                continue;
            }
            let offsets: String = row.get(1)?;
            let columns: Vec<Option<String>> = (0..FTS_COLUMNS.len())
                .map(|i| row.get(2 + i))
                .collect::<Result<_, _>>()?;
            for (col_idx, byte_offset, size) in parse_offsets(&offsets) {
                let Some(Some(text)) = columns.get(col_idx) else {
                    continue;
                };
                let end = byte_offset + size;
                if end > text.len() || !text.is_char_boundary(byte_offset) || !text.is_char_boundary(end) {
                    continue;
                }
                out.insert(text[byte_offset..end].to_ascii_lowercase());
            }
        }
    }

    for word in query.split_whitespace() {
        let trimmed = word.trim_matches('"');
        if !trimmed.is_empty() {
            out.insert(trimmed.to_ascii_lowercase());
        }
    }

    Ok(out)
}
