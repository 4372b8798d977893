use crate::domain::IngestService;
use async_trait::async_trait;
use fleetwatch_common::nats::{MessageHandler, ProcessError};
use std::sync::Arc;

/// Consumption-point handler for the inbound position subject.
pub struct IngestProcessor {
    service: Arc<IngestService>,
}

impl IngestProcessor {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for IngestProcessor {
    async fn handle(&self, _subject: &str, payload: &[u8]) -> Result<(), ProcessError> {
        self.service.ingest(payload).await?;
        Ok(())
    }
}
