use crate::domain::IngestService;
use crate::nats::{IngestProcessor, NatsPositionProducer};
use anyhow::Context;
use fleetwatch_common::nats::{NatsClient, NatsDeadLetterProducer, RetryPolicy, RetrySupervisor};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct IngestWorkerConfig {
    /// Core NATS subject devices (or upstream transports) publish raw
    /// samples to.
    pub inbound_subject: String,
    pub positions_stream: String,
    pub dlq_stream: String,
    pub retry_policy: RetryPolicy,
}

/// Bridges the unkeyed inbound firehose into the partitioned position
/// stream: subscribe, validate, publish keyed by vehicle id.
pub struct IngestWorker {
    nats_client: Arc<NatsClient>,
    supervisor: RetrySupervisor,
    inbound_subject: String,
}

impl IngestWorker {
    pub fn new(nats_client: Arc<NatsClient>, config: IngestWorkerConfig) -> Self {
        let publisher = nats_client.create_publisher_client();
        let producer = Arc::new(NatsPositionProducer::new(
            publisher.clone(),
            config.positions_stream.clone(),
        ));
        let service = Arc::new(IngestService::new(producer));
        let dead_letters = Arc::new(NatsDeadLetterProducer::new(publisher, config.dlq_stream));
        let supervisor = RetrySupervisor::new(
            config.inbound_subject.clone(),
            config.retry_policy,
            Arc::new(IngestProcessor::new(service)),
            dead_letters,
        );

        Self {
            nats_client,
            supervisor,
            inbound_subject: config.inbound_subject,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        let mut subscription = self
            .nats_client
            .core()
            .subscribe(self.inbound_subject.clone())
            .await
            .context("Failed to subscribe to inbound position subject")?;

        info!(subject = %self.inbound_subject, "Ingest bridge started");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping ingest bridge");
                    break;
                }
                maybe_message = subscription.next() => match maybe_message {
                    Some(message) => {
                        // Core NATS has no redelivery; a failed dead-letter
                        // redirect here means the sample is lost.
                        if let Err(e) = self
                            .supervisor
                            .process(message.subject.as_str(), &message.payload)
                            .await
                        {
                            error!(error = %e, "Inbound sample could not be processed or dead-lettered");
                        }
                    }
                    None => {
                        warn!("Inbound subscription closed by server");
                        break;
                    }
                }
            }
        }

        subscription
            .unsubscribe()
            .await
            .context("Failed to unsubscribe from inbound subject")?;
        info!("Ingest bridge stopped gracefully");
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            )
                -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>
            + Send,
    > {
        Box::new({
            let worker = self;
            move |ctx| Box::pin(async move { worker.run(ctx).await })
        })
    }
}
