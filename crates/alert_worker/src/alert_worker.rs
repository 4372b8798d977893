use crate::domain::AlertSinkService;
use crate::nats::AlertProcessor;
use fleetwatch_common::domain::{AlertEvent, AlertRepository};
use fleetwatch_common::fanout::FanoutHub;
use fleetwatch_common::nats::{
    NatsClient, NatsConsumer, NatsDeadLetterProducer, RetryPolicy, RetrySupervisor,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct AlertWorkerConfig {
    pub alerts_stream: String,
    pub alerts_subject: String,
    pub dlq_stream: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
    pub retry_policy: RetryPolicy,
}

/// The alert sink: consumes the derived-alert stream, records each alert
/// once and fans it out.
pub struct AlertWorker {
    consumer: NatsConsumer,
}

impl AlertWorker {
    pub async fn new(
        nats_client: Arc<NatsClient>,
        repository: Arc<dyn AlertRepository>,
        alert_feed: Arc<FanoutHub<AlertEvent>>,
        config: AlertWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing alert worker");

        let service = Arc::new(AlertSinkService::new(repository, alert_feed));
        let dead_letters = Arc::new(NatsDeadLetterProducer::new(
            nats_client.create_publisher_client(),
            config.dlq_stream.clone(),
        ));
        let supervisor = RetrySupervisor::new(
            config.alerts_stream.clone(),
            config.retry_policy,
            Arc::new(AlertProcessor::new(service)),
            dead_letters,
        );
        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.alerts_stream,
            &config.consumer_name,
            &config.alerts_subject,
            config.batch_size,
            config.batch_wait_secs,
            supervisor,
        )
        .await?;

        info!("Alert worker initialized");

        Ok(Self { consumer })
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
            let consumer = self.consumer;
            move |ctx| Box::pin(async move { consumer.run(ctx).await })
        })
    }
}
