pub mod domain;
pub mod fanout;
pub mod geo;
pub mod memory;
pub mod nats;
