pub mod archive;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod growth;
pub mod model;
pub mod progress;
pub mod render;
pub mod reports;
pub mod session;

pub use config::AppConfig;
pub use engine::{RunOptions, SizingEngine};
pub use error::Error;
pub use model::{SizingReport, UsageSample, Workload, WorkloadSizing};
pub use progress::{ProgressReporter, SilentReporter};
