pub mod pipeline;
pub mod scheduler;

pub use pipeline::{BackupEngine, BatchReport};
pub use scheduler::run_scheduler;
