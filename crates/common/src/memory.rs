mod alert_repository;
mod idle_episode_store;
mod vehicle_state_repository;
mod zone_membership_store;

pub use alert_repository::*;
pub use idle_episode_store::*;
pub use vehicle_state_repository::*;
pub use zone_membership_store::*;
