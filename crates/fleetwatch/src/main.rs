mod config;
mod telemetry;

use alert_worker::alert_worker::{AlertWorker, AlertWorkerConfig};
use config::ServiceConfig;
use detection_worker::detection_worker::{DetectionWorker, DetectionWorkerConfig};
use fleetwatch_common::domain::{AlertEvent, ClassificationPolicy, VehicleRuntimeState, ZoneLookup};
use fleetwatch_common::fanout::FanoutHub;
use fleetwatch_common::geo::InMemoryZoneIndex;
use fleetwatch_common::memory::{
    InMemoryAlertRepository, InMemoryIdleEpisodeStore, InMemoryVehicleStateRepository,
    InMemoryZoneMembershipStore,
};
use fleetwatch_common::nats::{NatsClient, RetryPolicy};
use fleetwatch_runner::Runner;
use ingest_worker::ingest_worker::{IngestWorker, IngestWorkerConfig};
use status_worker::status_worker::{StatusWorker, StatusWorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use telemetry::init_telemetry;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_telemetry(&config.log_level);
    info!(nats_url = %config.nats_url, "Starting fleetwatch service");

    // Broker connectivity is the only fatal startup dependency.
    let nats_client = match NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to connect to NATS");
            std::process::exit(1);
        }
    };

    if let Err(e) = ensure_streams(&nats_client, &config).await {
        error!(error = format!("{e:#}"), "Failed to ensure streams");
        std::process::exit(1);
    }

    let zone_lookup: Arc<dyn ZoneLookup> = match load_zone_index(&config.zones_path) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to load zone definitions");
            std::process::exit(1);
        }
    };

    let retry_policy = RetryPolicy {
        max_retries: config.retry_count,
        backoff: Duration::from_millis(config.retry_backoff_ms),
    };
    let classification_policy = ClassificationPolicy {
        offline_after: chrono::Duration::minutes(config.status_offline_threshold_minutes as i64),
        idle_after: chrono::Duration::minutes(config.status_idle_threshold_minutes as i64),
        idle_speed_kph: config.idle_speed_threshold_kph,
    };

    // Keyed state stores and repositories (in-memory in this deployment)
    let vehicle_states = Arc::new(InMemoryVehicleStateRepository::new());
    let idle_store = Arc::new(InMemoryIdleEpisodeStore::new());
    let membership_store = Arc::new(InMemoryZoneMembershipStore::new());
    let alert_repository = Arc::new(InMemoryAlertRepository::new());

    // Live feeds for downstream streaming transports
    let keepalive = Duration::from_secs(config.fanout_keepalive_secs);
    let alert_feed: Arc<FanoutHub<AlertEvent>> =
        Arc::new(FanoutHub::new(config.fanout_replay_capacity, keepalive));
    let live_feed: Arc<FanoutHub<VehicleRuntimeState>> =
        Arc::new(FanoutHub::new(config.fanout_replay_capacity, keepalive));

    let ingest_worker = IngestWorker::new(
        nats_client.clone(),
        IngestWorkerConfig {
            inbound_subject: config.ingest_subject.clone(),
            positions_stream: config.positions_stream.clone(),
            dlq_stream: config.dlq_stream.clone(),
            retry_policy,
        },
    );

    let detection_worker = match DetectionWorker::new(
        nats_client.clone(),
        zone_lookup,
        idle_store,
        membership_store,
        vehicle_states.clone(),
        classification_policy.clone(),
        live_feed,
        DetectionWorkerConfig {
            positions_stream: config.positions_stream.clone(),
            positions_subject: config.positions_subject.clone(),
            alerts_stream: config.alerts_stream.clone(),
            dlq_stream: config.dlq_stream.clone(),
            detection_consumer_name: config.detection_consumer_name.clone(),
            tracking_consumer_name: config.tracking_consumer_name.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
            retry_policy,
            speeding_threshold_kph: config.speeding_threshold_kph,
            idle_speed_threshold_kph: config.idle_speed_threshold_kph,
            idle_duration: chrono::Duration::minutes(config.idle_duration_minutes as i64),
            geofence_buffer_meters: config.geofence_buffer_meters,
            zone_lookup_timeout: Duration::from_millis(config.zone_lookup_timeout_ms),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to initialize detection worker");
            std::process::exit(1);
        }
    };

    let alert_worker = match AlertWorker::new(
        nats_client.clone(),
        alert_repository,
        alert_feed,
        AlertWorkerConfig {
            alerts_stream: config.alerts_stream.clone(),
            alerts_subject: config.alerts_subject.clone(),
            dlq_stream: config.dlq_stream.clone(),
            consumer_name: config.alert_consumer_name.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
            retry_policy,
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to initialize alert worker");
            std::process::exit(1);
        }
    };

    let status_worker = StatusWorker::new(
        vehicle_states,
        StatusWorkerConfig {
            sweep_interval: Duration::from_secs(config.status_sweep_interval_secs),
            policy: classification_policy,
        },
    );

    let mut runner = Runner::new()
        .with_boxed_process("ingest_bridge", ingest_worker.into_runner_process());

    for (name, process) in detection_worker.into_runner_processes() {
        runner = runner.with_boxed_process(name, process);
    }

    runner = runner
        .with_boxed_process("alert_sink", alert_worker.into_runner_process())
        .with_boxed_process("status_classifier", status_worker.into_runner_process())
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                if let Ok(client) = Arc::try_unwrap(nats_for_close) {
                    client.close().await;
                }
                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn ensure_streams(client: &NatsClient, config: &ServiceConfig) -> anyhow::Result<()> {
    client.ensure_stream(&config.positions_stream).await?;
    client.ensure_stream(&config.alerts_stream).await?;
    client.ensure_stream(&config.dlq_stream).await?;
    Ok(())
}

fn load_zone_index(zones_path: &str) -> anyhow::Result<InMemoryZoneIndex> {
    if zones_path.is_empty() {
        warn!("No zones file configured, geofence detection will see no zones");
        return Ok(InMemoryZoneIndex::new(Vec::new()));
    }

    let payload = std::fs::read(zones_path)?;
    let index = InMemoryZoneIndex::from_json(&payload)?;
    info!(
        zones_path = %zones_path,
        zone_count = index.zones().len(),
        "Loaded zone definitions"
    );
    Ok(index)
}
