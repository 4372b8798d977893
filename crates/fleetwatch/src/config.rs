use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Startup timeout for broker connection in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// JetStream stream carrying position samples
    #[serde(default = "default_positions_stream")]
    pub positions_stream: String,

    /// Subject filter for position consumers
    #[serde(default = "default_positions_subject")]
    pub positions_subject: String,

    /// JetStream stream carrying derived alerts
    #[serde(default = "default_alerts_stream")]
    pub alerts_stream: String,

    /// Subject filter for the alert sink consumer
    #[serde(default = "default_alerts_subject")]
    pub alerts_subject: String,

    /// JetStream stream receiving dead letters
    #[serde(default = "default_dlq_stream")]
    pub dlq_stream: String,

    /// Core NATS subject raw samples arrive on
    #[serde(default = "default_ingest_subject")]
    pub ingest_subject: String,

    #[serde(default = "default_detection_consumer_name")]
    pub detection_consumer_name: String,

    #[serde(default = "default_tracking_consumer_name")]
    pub tracking_consumer_name: String,

    #[serde(default = "default_alert_consumer_name")]
    pub alert_consumer_name: String,

    /// Batch size for pull consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    // Detection thresholds
    /// Speed above which a SPEEDING alert fires (kph)
    #[serde(default = "default_speeding_threshold_kph")]
    pub speeding_threshold_kph: f64,

    /// Speed at or below which a vehicle counts as stationary (kph)
    #[serde(default = "default_idle_speed_threshold_kph")]
    pub idle_speed_threshold_kph: f64,

    /// How long an idle episode must last before the IDLE alert (minutes)
    #[serde(default = "default_idle_duration_minutes")]
    pub idle_duration_minutes: u64,

    /// Hysteresis buffer around geofence boundaries (meters)
    #[serde(default = "default_geofence_buffer_meters")]
    pub geofence_buffer_meters: f64,

    /// Bound on every geospatial lookup call (milliseconds)
    #[serde(default = "default_zone_lookup_timeout_ms")]
    pub zone_lookup_timeout_ms: u64,

    // Status classification
    /// Silence after which a vehicle shows IDLE (minutes)
    #[serde(default = "default_status_idle_threshold_minutes")]
    pub status_idle_threshold_minutes: u64,

    /// Silence after which a vehicle shows OFFLINE (minutes)
    #[serde(default = "default_status_offline_threshold_minutes")]
    pub status_offline_threshold_minutes: u64,

    /// Interval between classifier sweeps (seconds)
    #[serde(default = "default_status_sweep_interval_secs")]
    pub status_sweep_interval_secs: u64,

    // Retry / dead-letter
    /// Retries before a message is dead-lettered
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Fixed backoff between retries (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    // Fan-out
    /// Replay buffer size per feed
    #[serde(default = "default_fanout_replay_capacity")]
    pub fanout_replay_capacity: usize,

    /// Keep-alive interval on idle feeds (seconds)
    #[serde(default = "default_fanout_keepalive_secs")]
    pub fanout_keepalive_secs: u64,

    /// Path to the zone definitions file (JSON array of zones); empty means
    /// no zones are loaded
    #[serde(default)]
    pub zones_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_positions_stream() -> String {
    "vehicle-positions".to_string()
}

fn default_positions_subject() -> String {
    "vehicle-positions.*".to_string()
}

fn default_alerts_stream() -> String {
    "vehicle-alerts".to_string()
}

fn default_alerts_subject() -> String {
    "vehicle-alerts.*".to_string()
}

fn default_dlq_stream() -> String {
    "fleetwatch-dlq".to_string()
}

fn default_ingest_subject() -> String {
    "ingest.position".to_string()
}

fn default_detection_consumer_name() -> String {
    "fleetwatch-detection".to_string()
}

fn default_tracking_consumer_name() -> String {
    "fleetwatch-tracking".to_string()
}

fn default_alert_consumer_name() -> String {
    "fleetwatch-alert-sink".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_speeding_threshold_kph() -> f64 {
    80.0
}

fn default_idle_speed_threshold_kph() -> f64 {
    1.0
}

fn default_idle_duration_minutes() -> u64 {
    10
}

fn default_geofence_buffer_meters() -> f64 {
    10.0
}

fn default_zone_lookup_timeout_ms() -> u64 {
    2000
}

fn default_status_idle_threshold_minutes() -> u64 {
    10
}

fn default_status_offline_threshold_minutes() -> u64 {
    30
}

fn default_status_sweep_interval_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_fanout_replay_capacity() -> usize {
    1000
}

fn default_fanout_keepalive_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FLEETWATCH"))
            .build()?
            .try_deserialize()
    }
}
