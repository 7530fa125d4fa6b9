//! EngineRegistry - the set of known engine instances
//!
//! Instances are kept in registration order because dispatch policy is
//! first-available. Lookups are multi-reader; every mutation goes through
//! the same write lock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use contracts::{InstanceId, TaskId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Dispatch eligibility state of one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Busy { task_id: TaskId },
    Unreachable,
}

/// A registered engine instance
#[derive(Debug, Clone)]
pub struct EngineInstance {
    pub instance_id: InstanceId,
    pub addresses: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub availability: Availability,
}

impl EngineInstance {
    /// Eligible for new work: available and reachable at ≥1 address.
    fn is_eligible(&self) -> bool {
        self.availability == Availability::Available && !self.addresses.is_empty()
    }
}

struct Entry<C> {
    info: EngineInstance,
    client: C,
}

/// Registry of live engine instances
///
/// Cloning shares the same underlying set.
pub struct EngineRegistry<C> {
    entries: Arc<RwLock<Vec<Entry<C>>>>,
}

impl<C> Clone for EngineRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<C: Clone> Default for EngineRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> EngineRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Insert a new instance or refresh an existing registration.
    ///
    /// A refresh updates addresses and the heartbeat timestamp; an
    /// unreachable instance that re-registers becomes available again.
    /// Returns true if the instance was newly inserted.
    pub async fn register(
        &self,
        instance_id: InstanceId,
        addresses: Vec<String>,
        client: C,
    ) -> bool {
        if addresses.is_empty() {
            warn!(instance_id = %instance_id, "registering instance without addresses; it will never be dispatched to");
        }

        let mut entries = self.entries.write().await;
        let now = Utc::now();

        if let Some(entry) = entries.iter_mut().find(|e| e.info.instance_id == instance_id) {
            entry.info.addresses = addresses;
            entry.info.last_seen_at = now;
            entry.client = client;
            if entry.info.availability == Availability::Unreachable {
                entry.info.availability = Availability::Available;
            }
            debug!(instance_id = %instance_id, "instance registration refreshed");
            return false;
        }

        info!(instance_id = %instance_id, "engine instance registered");
        entries.push(Entry {
            info: EngineInstance {
                instance_id,
                addresses,
                registered_at: now,
                last_seen_at: now,
                availability: Availability::Available,
            },
            client,
        });
        true
    }

    /// Remove an instance. Returns true if it existed.
    pub async fn unregister(&self, instance_id: &InstanceId) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| &e.info.instance_id != instance_id);
        let removed = entries.len() < before;
        if removed {
            info!(instance_id = %instance_id, "engine instance unregistered");
        }
        removed
    }

    /// Refresh an instance's heartbeat.
    pub async fn touch(&self, instance_id: &InstanceId) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| &e.info.instance_id == instance_id) {
            entry.info.last_seen_at = Utc::now();
        }
    }

    /// Evict instances whose heartbeat is older than `max_age`.
    pub async fn evict_stale(&self, max_age: Duration) -> Vec<InstanceId> {
        let cutoff = Utc::now() - max_age;
        let mut entries = self.entries.write().await;
        let mut evicted = Vec::new();
        entries.retain(|e| {
            if e.info.last_seen_at < cutoff {
                evicted.push(e.info.instance_id.clone());
                false
            } else {
                true
            }
        });
        for instance_id in &evicted {
            warn!(instance_id = %instance_id, "engine instance evicted (stale)");
        }
        evicted
    }

    /// Eligible instances in registration order (dispatch candidates).
    pub async fn candidates(&self) -> Vec<(InstanceId, C)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.info.is_eligible())
            .map(|e| (e.info.instance_id.clone(), e.client.clone()))
            .collect()
    }

    /// Client handle for a specific instance.
    pub async fn client(&self, instance_id: &InstanceId) -> Option<C> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| &e.info.instance_id == instance_id)
            .map(|e| e.client.clone())
    }

    /// Instance metadata snapshot.
    pub async fn get(&self, instance_id: &InstanceId) -> Option<EngineInstance> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| &e.info.instance_id == instance_id)
            .map(|e| e.info.clone())
    }

    /// Snapshot of all registered instances.
    pub async fn snapshot(&self) -> Vec<EngineInstance> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.info.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub(crate) async fn set_availability(
        &self,
        instance_id: &InstanceId,
        availability: Availability,
    ) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| &e.info.instance_id == instance_id) {
            entry.info.availability = availability;
            entry.info.last_seen_at = Utc::now();
        }
    }

    /// Mark an instance busy with a task.
    pub async fn mark_busy(&self, instance_id: &InstanceId, task_id: TaskId) {
        self.set_availability(instance_id, Availability::Busy { task_id })
            .await;
    }

    /// Return an instance to the available pool.
    pub async fn mark_available(&self, instance_id: &InstanceId) {
        self.set_availability(instance_id, Availability::Available)
            .await;
    }

    /// Take an instance out of rotation after a transport failure.
    pub async fn mark_unreachable(&self, instance_id: &InstanceId) {
        warn!(instance_id = %instance_id, "marking engine instance unreachable");
        self.set_availability(instance_id, Availability::Unreachable)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_refresh() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();

        assert!(
            registry
                .register("e1".into(), vec!["tcp://a:1".into()], 1)
                .await
        );
        assert!(
            !registry
                .register("e1".into(), vec!["tcp://a:2".into()], 2)
                .await
        );

        assert_eq!(registry.len().await, 1);
        let info = registry.get(&"e1".into()).await.unwrap();
        assert_eq!(info.addresses, vec!["tcp://a:2".to_string()]);
        assert_eq!(registry.client(&"e1".into()).await, Some(2));
    }

    #[tokio::test]
    async fn test_candidates_in_registration_order() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();
        registry.register("e1".into(), vec!["a".into()], 1).await;
        registry.register("e2".into(), vec!["b".into()], 2).await;
        registry.register("e3".into(), vec!["c".into()], 3).await;

        let ids: Vec<InstanceId> = registry
            .candidates()
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let expected: Vec<InstanceId> = vec!["e1".into(), "e2".into(), "e3".into()];
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_candidates_skip_busy_unreachable_and_addressless() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();
        registry.register("busy".into(), vec!["a".into()], 1).await;
        registry.register("down".into(), vec!["b".into()], 2).await;
        registry.register("bare".into(), vec![], 3).await;
        registry.register("free".into(), vec!["d".into()], 4).await;

        registry.mark_busy(&"busy".into(), "t1".into()).await;
        registry.mark_unreachable(&"down".into()).await;

        let ids: Vec<InstanceId> = registry
            .candidates()
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let expected: Vec<InstanceId> = vec!["free".into()];
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_reregister_clears_unreachable() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();
        registry.register("e1".into(), vec!["a".into()], 1).await;
        registry.mark_unreachable(&"e1".into()).await;
        assert!(registry.candidates().await.is_empty());

        registry.register("e1".into(), vec!["a".into()], 1).await;
        assert_eq!(registry.candidates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_stale() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();
        registry.register("e1".into(), vec!["a".into()], 1).await;

        // Nothing is stale with a generous cutoff
        assert!(registry.evict_stale(Duration::seconds(60)).await.is_empty());

        // Everything is stale with a negative cutoff
        let evicted = registry.evict_stale(Duration::seconds(-1)).await;
        let expected: Vec<InstanceId> = vec!["e1".into()];
        assert_eq!(evicted, expected);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry: EngineRegistry<u32> = EngineRegistry::new();
        registry.register("e1".into(), vec!["a".into()], 1).await;
        assert!(registry.unregister(&"e1".into()).await);
        assert!(!registry.unregister(&"e1".into()).await);
    }
}
