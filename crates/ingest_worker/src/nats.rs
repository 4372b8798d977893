mod ingest_processor;
mod position_producer;

pub use ingest_processor::*;
pub use position_producer::*;
