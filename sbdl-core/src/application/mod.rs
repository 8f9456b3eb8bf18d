// sbdl-core/src/application/mod.rs

pub mod cancel;
pub mod clean;
pub mod preview;
pub mod publisher;
pub mod report;
pub mod retry;
pub mod runner;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI peut faire `use sbdl_core::application::{PublicationRun, clean_project};`
// sans connaître la structure interne des fichiers.

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use clean::clean_project;
pub use preview::{Preview, preview_partition};
pub use publisher::{FailedDelivery, PublishError, PublishOutcome, Publisher, PublisherConfig};
pub use report::{BuildFailure, PartitionReport, PartitionStatus, RUN_RESULTS_FILE, RunReport};
pub use retry::RetryPolicy;
pub use runner::PublicationRun;
