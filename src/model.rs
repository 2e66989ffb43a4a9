//! Row types shared across the store: plain `Clone` structs with no
//! behavior beyond small, self-contained helpers like `satisfies`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type FolderId = i64;
pub type MessageRowId = i64;

/// Sentinel UID-space value meaning "unknown" (IMAP UIDs are never 0).
pub const UID_UNKNOWN: i64 = 0;

/// Path to a folder, root-to-leaf, e.g. `["A", "B", "C"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath(pub Vec<String>);

impl FolderPath {
    pub fn root(name: impl Into<String>) -> Self {
        FolderPath(vec![name.into()])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        FolderPath(segments)
    }

    pub fn parent(&self) -> Option<FolderPath> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(FolderPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn as_key(&self) -> String {
        self.0.join("/")
    }
}

impl std::fmt::Display for FolderPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// IMAP mailbox attribute flags, serialized as a JSON array in `FolderTable.attributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAttributes(pub Vec<String>);

/// Properties of a folder as last reconciled from IMAP, cached on the row
/// and mirrored onto any live `FolderHandle`.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderProperties {
    pub attributes: FolderAttributes,
    pub last_seen_total: u32,
    pub last_seen_status_total: u32,
    pub uid_validity: i64,
    pub uid_next: i64,
    pub unread_count: u32,
}

impl Default for FolderProperties {
    fn default() -> Self {
        FolderProperties {
            attributes: FolderAttributes::default(),
            last_seen_total: 0,
            last_seen_status_total: 0,
            uid_validity: UID_UNKNOWN,
            uid_next: UID_UNKNOWN,
            unread_count: 0,
        }
    }
}

impl FolderProperties {
    /// "Best known message count": SELECT/EXAMINE wins, STATUS is the
    /// fallback for folders that have never been opened this session.
    pub fn best_known_total(&self) -> u32 {
        if self.last_seen_total != 0 {
            self.last_seen_total
        } else {
            self.last_seen_status_total
        }
    }
}

/// A folder row as persisted in `FolderTable`.
#[derive(Debug, Clone)]
pub struct FolderRow {
    pub id: FolderId,
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub properties: FolderProperties,
}

/// Descriptor of IMAP folder state, consumed (not produced) by this crate —
/// the session layer builds one of these from a STATUS or SELECT/EXAMINE
/// response.
#[derive(Debug, Clone, Default)]
pub struct ImapFolderDescriptor {
    pub select_examine_messages: Option<u32>,
    pub status_messages: Option<u32>,
    pub uid_validity: Option<i64>,
    pub uid_next: Option<i64>,
    pub attrs: Vec<String>,
    pub email_unread: Option<u32>,
    pub unseen: Option<u32>,
    pub recent: Option<u32>,
}

/// Bits of `MessageTable.fields_bitmask`: which logical fields a row has
/// actually been populated with. Callers request a subset and get
/// `IncompleteMessage` if it is not satisfied.
pub struct MessageField;

impl MessageField {
    pub const MESSAGE_ID: u32 = 0b0000_0001;
    pub const IN_REPLY_TO: u32 = 0b0000_0010;
    pub const INTERNALDATE: u32 = 0b0000_0100;
    pub const SUBJECT: u32 = 0b0000_1000;
    pub const FROM: u32 = 0b0001_0000;
    pub const RECEIVERS: u32 = 0b0010_0000;
    pub const CC: u32 = 0b0100_0000;
    pub const BCC: u32 = 0b1000_0000;
    pub const BODY: u32 = 0b1_0000_0000;
    pub const ATTACHMENT: u32 = 0b10_0000_0000;
}

/// Fields needed to index a message for full-text search: originators,
/// receivers, subject, plus whatever a "valid message row" minimally needs.
pub const INDEXING_FIELDS: u32 = MessageField::SUBJECT
    | MessageField::FROM
    | MessageField::RECEIVERS
    | MessageField::CC
    | MessageField::BCC
    | MessageField::BODY
    | MessageField::ATTACHMENT
    | MessageField::MESSAGE_ID
    | MessageField::INTERNALDATE;

/// A message row as persisted in `MessageTable`.
#[derive(Debug, Clone, Default)]
pub struct MessageRow {
    pub id: MessageRowId,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub internaldate_time_t: i64,
    pub subject: Option<String>,
    pub from_field: Option<String>,
    pub receivers: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub body: Option<String>,
    pub attachment: Option<String>,
    pub flags: HashSet<String>,
    pub fields_bitmask: u32,
}

impl MessageRow {
    pub fn satisfies(&self, requested: u32) -> bool {
        self.fields_bitmask & requested == requested
    }
}

/// A location row: `message` is present in `folder`, possibly tombstoned.
#[derive(Debug, Clone, Copy)]
pub struct MessageLocation {
    pub message_id: MessageRowId,
    pub folder_id: FolderId,
    pub remove_marker: bool,
}

/// A contact row, loaded en masse at open.
#[derive(Debug, Clone)]
pub struct ContactRow {
    pub email: String,
    pub real_name: Option<String>,
    pub highest_importance: i64,
    pub normalized_email: String,
    pub flags: i64,
}

/// Result identifier returned by `search`: stable enough for pagination —
/// (row id, internal date) rather than just a row id, so a caller can detect
/// a row that was re-dated between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResultId {
    pub row_id: MessageRowId,
    pub internaldate_time_t: i64,
}

/// A blacklist entry for folder-scoped exclusion: either a concrete path or
/// the "folderless" sentinel (messages with no non-tombstoned location).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderBlacklistEntry {
    Path(FolderPath),
    Folderless,
}
