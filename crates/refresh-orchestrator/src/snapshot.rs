use std::sync::Arc;

use dashboard_core::Snapshot;
use tokio::sync::watch;

/// Shared slot holding the latest published snapshot. Publishing
/// replaces the whole snapshot at once; readers hold an `Arc` to
/// whichever version they grabbed and are never blocked by a publish.
#[derive(Clone)]
pub struct SnapshotStore {
    slot: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::empty()));
        Self { slot: Arc::new(tx) }
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.slot.send_replace(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.slot.borrow().clone()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_starts_empty_and_unpublished() {
        let store = SnapshotStore::new();
        let snapshot = store.current();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.generated_at.is_none());
    }

    #[test]
    fn test_publish_replaces_previous_version() {
        let store = SnapshotStore::new();

        let mut first = Snapshot::empty();
        first.generated_at = Some(Utc::now());
        store.publish(first);
        let held = store.current();
        assert!(held.generated_at.is_some());

        let second = Snapshot::empty();
        store.publish(second);

        // The earlier reader still sees the version it grabbed
        assert!(held.generated_at.is_some());
        assert!(store.current().generated_at.is_none());
    }

    #[test]
    fn test_reads_share_the_same_version() {
        let store = SnapshotStore::new();
        store.publish(Snapshot::empty());

        let a = store.current();
        let b = store.current();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
