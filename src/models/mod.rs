// Data models (structs)
pub mod batch;
pub mod project;
pub mod stats;

pub use batch::*;
pub use project::*;
pub use stats::*;
