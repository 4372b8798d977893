use crate::domain::AlertSinkService;
use async_trait::async_trait;
use fleetwatch_common::domain::AlertEvent;
use fleetwatch_common::nats::{MessageHandler, ProcessError};
use std::sync::Arc;

/// Consumption-point handler for the derived-alert stream.
pub struct AlertProcessor {
    service: Arc<AlertSinkService>,
}

impl AlertProcessor {
    pub fn new(service: Arc<AlertSinkService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for AlertProcessor {
    async fn handle(&self, _subject: &str, payload: &[u8]) -> Result<(), ProcessError> {
        let alert = AlertEvent::from_json(payload)?;
        self.service.process_alert(alert).await?;
        Ok(())
    }
}
