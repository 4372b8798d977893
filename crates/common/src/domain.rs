mod alert;
mod classification;
mod position;
mod result;
mod state;
mod vehicle;
mod zone;

pub use alert::*;
pub use classification::*;
pub use position::*;
pub use result::*;
pub use state::*;
pub use vehicle::*;
pub use zone::*;
