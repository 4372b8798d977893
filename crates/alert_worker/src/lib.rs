pub mod alert_worker;
pub mod domain;
pub mod nats;
