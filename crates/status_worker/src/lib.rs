pub mod domain;
pub mod status_worker;
