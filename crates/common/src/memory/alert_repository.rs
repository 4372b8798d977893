use crate::domain::{AlertEvent, AlertInsert, AlertKey, AlertRepository, DomainResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`AlertRepository`], idempotent on the
/// alert's natural key.
pub struct InMemoryAlertRepository {
    alerts: RwLock<HashMap<AlertKey, AlertEvent>>,
}

impl InMemoryAlertRepository {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn all(&self) -> Vec<AlertEvent> {
        self.alerts.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.alerts.read().await.len()
    }
}

impl Default for InMemoryAlertRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertRepository for InMemoryAlertRepository {
    async fn insert(&self, alert: &AlertEvent) -> DomainResult<AlertInsert> {
        let mut alerts = self.alerts.write().await;
        match alerts.entry(alert.dedup_key()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(AlertInsert::Duplicate),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(alert.clone());
                Ok(AlertInsert::Recorded)
            }
        }
    }
}
