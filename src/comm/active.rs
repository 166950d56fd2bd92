use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::RwLock;

use crate::protocol::SubsystemKind;

/// Set of modules the orchestrator has started for the current session.
///
/// The transport consults it before forwarding a subsystem frame.
#[derive(Debug, Clone, Default)]
pub struct ActiveModules(Arc<RwLock<BTreeSet<SubsystemKind>>>);

impl ActiveModules {
    /// Marks `kind` as running.
    pub async fn enable(&self, kind: SubsystemKind) {
        self.0.write().await.insert(kind);
    }

    /// Marks `kind` as stopped.
    pub async fn disable(&self, kind: SubsystemKind) {
        self.0.write().await.remove(&kind);
    }

    /// Whether `kind` is running.
    pub async fn contains(&self, kind: SubsystemKind) -> bool {
        self.0.read().await.contains(&kind)
    }
}
