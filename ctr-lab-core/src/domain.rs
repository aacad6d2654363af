pub mod config;
pub mod sample;
pub mod batch;

pub use config::*;
pub use sample::*;
pub use batch::*;
