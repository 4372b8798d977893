use crate::domain::{DomainResult, IdleEpisode, IdleEpisodeStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`IdleEpisodeStore`] using a HashMap keyed by
/// vehicle id.
pub struct InMemoryIdleEpisodeStore {
    episodes: RwLock<HashMap<String, IdleEpisode>>,
}

impl InMemoryIdleEpisodeStore {
    pub fn new() -> Self {
        Self {
            episodes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIdleEpisodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdleEpisodeStore for InMemoryIdleEpisodeStore {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<IdleEpisode>> {
        Ok(self.episodes.read().await.get(vehicle_id).cloned())
    }

    async fn put(&self, vehicle_id: &str, episode: IdleEpisode) -> DomainResult<()> {
        self.episodes
            .write()
            .await
            .insert(vehicle_id.to_string(), episode);
        Ok(())
    }

    async fn delete(&self, vehicle_id: &str) -> DomainResult<()> {
        self.episodes.write().await.remove(vehicle_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_put_get_delete_round_trip() {
        let store = InMemoryIdleEpisodeStore::new();
        let now = Utc::now();
        let episode = IdleEpisode {
            started_at: now,
            alert_sent: false,
            last_speed: 0.5,
            last_update: now,
        };

        store.put("TRK-01", episode.clone()).await.unwrap();
        assert_eq!(store.get("TRK-01").await.unwrap(), Some(episode));

        store.delete("TRK-01").await.unwrap();
        assert_eq!(store.get("TRK-01").await.unwrap(), None);
    }
}
