use crate::domain::{DomainResult, VehicleRuntimeState, VehicleStateRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`VehicleStateRepository`] using a HashMap
/// keyed by vehicle id.
pub struct InMemoryVehicleStateRepository {
    states: RwLock<HashMap<String, VehicleRuntimeState>>,
}

impl InMemoryVehicleStateRepository {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVehicleStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleStateRepository for InMemoryVehicleStateRepository {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<VehicleRuntimeState>> {
        Ok(self.states.read().await.get(vehicle_id).cloned())
    }

    async fn upsert(&self, state: VehicleRuntimeState) -> DomainResult<()> {
        self.states
            .write()
            .await
            .insert(state.vehicle_id.clone(), state);
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<VehicleRuntimeState>> {
        Ok(self.states.read().await.values().cloned().collect())
    }
}
