pub mod domain;
pub mod ingest_worker;
pub mod nats;
