pub mod detection_worker;
pub mod domain;
pub mod nats;
