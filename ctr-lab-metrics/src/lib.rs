pub mod aggregators;
pub mod battery;
pub mod design;
pub mod runner;
pub mod statistical;

pub use aggregators::*;
pub use battery::*;
pub use design::*;
pub use runner::*;
pub use statistical::*;
