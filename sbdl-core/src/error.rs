// sbdl-core/src/error.rs

use crate::application::publisher::PublishError;
use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SbdlError {
    // --- ERREURS DU DOMAINE (Build d'enveloppe) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Config, Sources) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS SYSTÉMIQUES DE PUBLICATION ---
    #[error(transparent)]
    Publish(#[from] PublishError),

    // --- ERREURS APPLICATIVES ---
    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for SbdlError {
    fn from(err: std::io::Error) -> Self {
        SbdlError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<duckdb::Error> for SbdlError {
    fn from(err: duckdb::Error) -> Self {
        SbdlError::Infrastructure(InfrastructureError::from(err))
    }
}
