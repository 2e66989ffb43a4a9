//! A local per-account mail store: folder tree, message cache, and
//! full-text search, meant to sit underneath an IMAP session layer. This
//! crate owns persistence and reconciliation only; fetching, parsing, and
//! rendering messages belong to the caller.

mod config;
mod db;
mod error;
mod indexer;
mod model;
mod registry;
mod search;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use indexer::{NullProgressMonitor, ProgressMonitor};
pub use model::{
    ContactRow, FolderAttributes, FolderBlacklistEntry, FolderId, FolderPath, FolderProperties,
    FolderRow, ImapFolderDescriptor, MessageField, MessageLocation, MessageRow, MessageRowId,
    SearchResultId, INDEXING_FIELDS, UID_UNKNOWN,
};
pub use registry::{FolderHandle, UnreadEvent};
pub use search::{compile, CompiledQuery, FIELD_ANY};
pub use store::AccountStore;
pub use tokio_util::sync::CancellationToken;
