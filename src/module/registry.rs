//! Registry of running execution units.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

/// Metadata about a running execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    /// Unit UUID.
    pub id: Uuid,
    /// Module name.
    pub module: String,
    /// When the unit was registered.
    pub started_at: DateTime<Utc>,
}

impl UnitInfo {
    pub fn new(id: Uuid, module: impl Into<String>) -> Self {
        Self {
            id,
            module: module.into(),
            started_at: Utc::now(),
        }
    }
}

/// Set of execution units that have started and not yet completed.
///
/// Cloning yields another handle to the same set. The active count is
/// published on a watch channel so callers can wait for the set to drain.
#[derive(Clone)]
pub struct ExecutionRegistry {
    units: Arc<RwLock<HashMap<Uuid, UnitInfo>>>,
    active: Arc<watch::Sender<usize>>,
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRegistry")
            .field("unit_count", &*self.active.borrow())
            .finish_non_exhaustive()
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            units: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(active),
        }
    }

    /// Register a unit.
    pub async fn add(&self, unit: UnitInfo) {
        let mut units = self.units.write().await;
        tracing::debug!(unit_id = %unit.id, module = %unit.module, "Unit registered");
        units.insert(unit.id, unit);
        self.active.send_replace(units.len());
    }

    /// Deregister a unit. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: &Uuid) -> Option<UnitInfo> {
        let mut units = self.units.write().await;
        let removed = units.remove(id);
        self.active.send_replace(units.len());
        if let Some(unit) = &removed {
            tracing::debug!(unit_id = %unit.id, module = %unit.module, "Unit deregistered");
        }
        removed
    }

    /// Number of running units.
    pub async fn len(&self) -> usize {
        self.units.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.units.read().await.contains_key(id)
    }

    /// Running units, oldest first.
    pub async fn list(&self) -> Vec<UnitInfo> {
        let mut units: Vec<_> = self.units.read().await.values().cloned().collect();
        units.sort_by_key(|unit| unit.started_at);
        units
    }

    /// Receiver tracking the number of running units.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.active.subscribe()
    }

    /// Resolve once no unit is registered.
    pub async fn wait_idle(&self) {
        let mut active = self.active.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = active.wait_for(|count| *count == 0).await;
    }
}
