mod zone_index;

pub use zone_index::*;
