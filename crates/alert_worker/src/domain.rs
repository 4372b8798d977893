mod alert_sink_service;

pub use alert_sink_service::*;
