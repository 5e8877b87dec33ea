mod backing;
pub mod config;
pub mod disk_array;
pub mod naming;
pub mod stats;

pub use config::{BackingConfig, DropPolicy};
pub use disk_array::DiskArray;
pub use naming::{NameGenerator, PidRandomNames};
pub use stats::FillStats;
