use crate::domain::{
    DetectionService, GeofenceDetector, IdleDetector, SpeedingDetector, TrackingService,
};
use crate::nats::{DetectionProcessor, NatsAlertProducer, TrackingProcessor};
use fleetwatch_common::domain::{
    ClassificationPolicy, IdleEpisodeStore, VehicleRuntimeState, VehicleStateRepository,
    ZoneLookup, ZoneMembershipStore,
};
use fleetwatch_common::fanout::FanoutHub;
use fleetwatch_common::nats::{
    NatsClient, NatsConsumer, NatsDeadLetterProducer, RetryPolicy, RetrySupervisor,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct DetectionWorkerConfig {
    pub positions_stream: String,
    pub positions_subject: String,
    pub alerts_stream: String,
    pub dlq_stream: String,
    pub detection_consumer_name: String,
    pub tracking_consumer_name: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
    pub retry_policy: RetryPolicy,
    pub speeding_threshold_kph: f64,
    pub idle_speed_threshold_kph: f64,
    pub idle_duration: chrono::Duration,
    pub geofence_buffer_meters: f64,
    pub zone_lookup_timeout: std::time::Duration,
}

/// The detection side of the engine: two consumer groups on the position
/// stream, one running the detectors and one maintaining vehicle state.
pub struct DetectionWorker {
    detection_consumer: NatsConsumer,
    tracking_consumer: NatsConsumer,
}

impl DetectionWorker {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        nats_client: Arc<NatsClient>,
        zone_lookup: Arc<dyn ZoneLookup>,
        idle_store: Arc<dyn IdleEpisodeStore>,
        membership_store: Arc<dyn ZoneMembershipStore>,
        vehicle_states: Arc<dyn VehicleStateRepository>,
        classification_policy: ClassificationPolicy,
        live_feed: Arc<FanoutHub<VehicleRuntimeState>>,
        config: DetectionWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing detection worker");

        let publisher = nats_client.create_publisher_client();
        let alert_producer = Arc::new(NatsAlertProducer::new(
            publisher.clone(),
            config.alerts_stream.clone(),
        ));
        let dead_letters = Arc::new(NatsDeadLetterProducer::new(
            publisher,
            config.dlq_stream.clone(),
        ));

        // Detector consumer
        let detection_service = Arc::new(DetectionService::new(
            SpeedingDetector::new(config.speeding_threshold_kph),
            IdleDetector::new(
                idle_store,
                alert_producer.clone(),
                config.idle_speed_threshold_kph,
                config.idle_duration,
            ),
            GeofenceDetector::new(
                zone_lookup,
                membership_store,
                alert_producer.clone(),
                config.geofence_buffer_meters,
                config.zone_lookup_timeout,
            ),
            alert_producer,
        ));
        let detection_supervisor = RetrySupervisor::new(
            config.positions_stream.clone(),
            config.retry_policy,
            Arc::new(DetectionProcessor::new(detection_service)),
            dead_letters.clone(),
        );
        let detection_consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.positions_stream,
            &config.detection_consumer_name,
            &config.positions_subject,
            config.batch_size,
            config.batch_wait_secs,
            detection_supervisor,
        )
        .await?;

        // Tracking consumer
        let tracking_service = Arc::new(TrackingService::new(
            vehicle_states,
            classification_policy,
            live_feed,
        ));
        let tracking_supervisor = RetrySupervisor::new(
            config.positions_stream.clone(),
            config.retry_policy,
            Arc::new(TrackingProcessor::new(tracking_service)),
            dead_letters,
        );
        let tracking_consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.positions_stream,
            &config.tracking_consumer_name,
            &config.positions_subject,
            config.batch_size,
            config.batch_wait_secs,
            tracking_supervisor,
        )
        .await?;

        info!("Detection worker initialized");

        Ok(Self {
            detection_consumer,
            tracking_consumer,
        })
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_processes(
        self,
    ) -> Vec<(
        &'static str,
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    )> {
        vec![
            (
                "detection_consumer",
                Box::new({
                    let consumer = self.detection_consumer;
                    move |ctx| Box::pin(async move { consumer.run(ctx).await })
                }),
            ),
            (
                "tracking_consumer",
                Box::new({
                    let consumer = self.tracking_consumer;
                    move |ctx| Box::pin(async move { consumer.run(ctx).await })
                }),
            ),
        ]
    }
}
