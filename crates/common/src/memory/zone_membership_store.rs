use crate::domain::{DomainResult, ZoneMembershipStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`ZoneMembershipStore`] using a HashMap keyed
/// by vehicle id.
pub struct InMemoryZoneMembershipStore {
    memberships: RwLock<HashMap<String, String>>,
}

impl InMemoryZoneMembershipStore {
    pub fn new() -> Self {
        Self {
            memberships: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryZoneMembershipStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ZoneMembershipStore for InMemoryZoneMembershipStore {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<String>> {
        Ok(self.memberships.read().await.get(vehicle_id).cloned())
    }

    async fn put(&self, vehicle_id: &str, zone_name: String) -> DomainResult<()> {
        self.memberships
            .write()
            .await
            .insert(vehicle_id.to_string(), zone_name);
        Ok(())
    }

    async fn delete(&self, vehicle_id: &str) -> DomainResult<()> {
        self.memberships.write().await.remove(vehicle_id);
        Ok(())
    }
}
