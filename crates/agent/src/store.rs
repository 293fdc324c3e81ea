use std::collections::BTreeMap;
use std::sync::Arc;

use boardsight_core::domain::BoardCategory;
use boardsight_core::snapshot::{BoardSnapshot, Snapshot};
use tokio::sync::RwLock;

/// Current-snapshot pointer. Readers clone the `Arc` and never observe a
/// partially replaced snapshot; writers swap the whole pointer.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Starts from the empty snapshot (generation 0, every board unavailable).
    pub fn new() -> Self {
        Self { current: RwLock::new(Arc::new(Snapshot::empty())) }
    }

    pub async fn current(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    pub async fn publish(&self, boards: BTreeMap<BoardCategory, BoardSnapshot>) -> Arc<Snapshot> {
        let mut current = self.current.write().await;
        let next = Arc::new(Snapshot { generation: current.generation + 1, boards });
        *current = Arc::clone(&next);
        next
    }
}
