//! Folder Registry: a weak-reference index from folder path to live
//! `FolderHandle`s. Guarantees at most one live handle per path and evicts
//! its entry automatically once the last caller drops its handle.
//!
//! The registry owns a `Weak<FolderHandleInner>` per path; `FolderHandleInner`
//! holds a `Weak` back-pointer to the registry's shared map and removes its
//! own entry from `Drop` once the last strong `Arc` goes away. No explicit
//! release call is needed.

use crate::model::{FolderId, FolderPath, FolderProperties, MessageRowId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::UnboundedSender;

/// Reported by a live folder handle when the IMAP session layer (or any
/// other caller of `report_unread_changes`) learns that a batch of messages
/// changed unread status. The account store subscribes to these to drive
/// cross-folder unread propagation.
#[derive(Debug, Clone)]
pub struct UnreadEvent {
    pub source_folder: FolderPath,
    /// (message row id, now-unread) pairs.
    pub changes: Vec<(MessageRowId, bool)>,
}

struct RegistryShared {
    map: Mutex<HashMap<String, Weak<FolderHandleInner>>>,
}

impl RegistryShared {
    fn remove(&self, key: &str) {
        self.map.lock().expect("registry mutex poisoned").remove(key);
    }
}

struct FolderHandleInner {
    path: FolderPath,
    id: FolderId,
    properties: Mutex<FolderProperties>,
    registry: Weak<RegistryShared>,
    unread_tx: UnboundedSender<UnreadEvent>,
}

impl Drop for FolderHandleInner {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.path.as_key());
        }
    }
}

/// A live, cached per-folder handle. Cheap to clone (it's an `Arc`); the
/// message-level API (fetch, flag, expunge, …) is an external collaborator
/// not specified here — this crate only creates, caches, reconciles, and
/// tears these down.
#[derive(Clone)]
pub struct FolderHandle {
    inner: Arc<FolderHandleInner>,
}

impl FolderHandle {
    pub fn path(&self) -> &FolderPath {
        &self.inner.path
    }

    pub fn id(&self) -> FolderId {
        self.inner.id
    }

    pub fn properties(&self) -> FolderProperties {
        self.inner
            .properties
            .lock()
            .expect("folder handle mutex poisoned")
            .clone()
    }

    /// Update cached properties in place, e.g. after a STATUS/SELECT
    /// reconciliation.
    pub fn update_properties(&self, properties: FolderProperties) {
        *self.inner.properties.lock().expect("folder handle mutex poisoned") = properties;
    }

    /// Apply a signed delta to the cached unread count.
    pub(crate) fn apply_unread_delta(&self, delta: i64) {
        let mut props = self.inner.properties.lock().expect("folder handle mutex poisoned");
        let updated = props.unread_count as i64 + delta;
        props.unread_count = updated.max(0) as u32;
    }

    /// Called by the (external) session layer when it learns that a batch
    /// of messages in this folder changed unread status; emits the
    /// "unread updated" signal the account store subscribes to.
    pub fn report_unread_changes(&self, changes: Vec<(MessageRowId, bool)>) {
        let _ = self.inner.unread_tx.send(UnreadEvent {
            source_folder: self.inner.path.clone(),
            changes,
        });
    }
}

/// Weak-reference index from folder path to live `FolderHandle`. Cheap to
/// clone (shares the same underlying map via `Arc`), so the account store
/// can hand a clone to the unread-propagation task.
#[derive(Clone)]
pub(crate) struct FolderRegistry {
    shared: Arc<RegistryShared>,
}

impl FolderRegistry {
    pub(crate) fn new() -> Self {
        FolderRegistry {
            shared: Arc::new(RegistryShared {
                map: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the live handle for `path` if one still has a strong
    /// reference somewhere, else `None`.
    pub(crate) fn get_local_folder(&self, path: &FolderPath) -> Option<FolderHandle> {
        let map = self.shared.map.lock().expect("registry mutex poisoned");
        map.get(&path.as_key())
            .and_then(Weak::upgrade)
            .map(|inner| FolderHandle { inner })
    }

    /// Returns the existing live handle for `path`, updating its cached
    /// properties, or constructs and installs a new one.
    pub(crate) fn create_local_folder(
        &self,
        path: FolderPath,
        id: FolderId,
        properties: FolderProperties,
        unread_tx: UnboundedSender<UnreadEvent>,
    ) -> FolderHandle {
        if let Some(existing) = self.get_local_folder(&path) {
            existing.update_properties(properties);
            return existing;
        }

        let inner = Arc::new(FolderHandleInner {
            path: path.clone(),
            id,
            properties: Mutex::new(properties),
            registry: Arc::downgrade(&self.shared),
            unread_tx,
        });
        self.shared
            .map
            .lock()
            .expect("registry mutex poisoned")
            .insert(path.as_key(), Arc::downgrade(&inner));
        FolderHandle { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> UnboundedSender<UnreadEvent> {
        tokio::sync::mpsc::unbounded_channel().0
    }

    #[test]
    fn reuses_live_handle_for_same_path() {
        let registry = FolderRegistry::new();
        let path = FolderPath::root("INBOX");
        let a = registry.create_local_folder(path.clone(), 1, FolderProperties::default(), sender());
        let b = registry.get_local_folder(&path).expect("handle should still be live");
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn evicts_entry_once_last_strong_ref_drops() {
        let registry = FolderRegistry::new();
        let path = FolderPath::root("INBOX");
        let handle = registry.create_local_folder(path.clone(), 1, FolderProperties::default(), sender());
        drop(handle);
        assert!(registry.get_local_folder(&path).is_none());
        assert!(registry.shared.map.lock().unwrap().is_empty());
    }
}
