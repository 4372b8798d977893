mod client;
mod consumer;
mod dead_letter;
mod supervisor;
mod traits;

pub use client::*;
pub use consumer::*;
pub use dead_letter::*;
pub use supervisor::*;
pub use traits::*;
