mod detection_service;
mod geofence_detector;
mod idle_detector;
mod speeding_detector;
mod tracking_service;

pub use detection_service::*;
pub use geofence_detector::*;
pub use idle_detector::*;
pub use speeding_detector::*;
pub use tracking_service::*;
