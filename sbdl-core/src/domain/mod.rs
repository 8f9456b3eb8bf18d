pub mod envelope;
pub mod error;
pub mod join;
pub mod model;
pub mod ports;
pub mod project;
pub mod quality;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
pub use quality::DataQualityIssue;
