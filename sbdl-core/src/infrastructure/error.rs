// sbdl-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(sbdl::infra::database::duckdb),
        help("An error occurred while reading source files through DuckDB.")
    )]
    DuckDB(#[from] duckdb::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(sbdl::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(sbdl::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(sbdl::infra::config_missing))]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sbdl::infra::config_invalid),
        help("See the publisher/broker sections of sbdl.yaml for allowed ranges.")
    )]
    InvalidConfig(#[from] validator::ValidationErrors),

    // --- SOURCES ---
    #[error("Partition {load_date} missing for table '{table}' (expected {path})")]
    #[diagnostic(
        code(sbdl::infra::partition_missing),
        help("The extraction step must land all three tables before publication starts.")
    )]
    PartitionMissing {
        table: String,
        load_date: String,
        path: String,
    },

    #[error("Source '{table}' is missing required column '{column}'")]
    #[diagnostic(code(sbdl::infra::source_schema))]
    MissingColumn { table: String, column: String },

    // --- SERIALIZATION ---
    #[error("JSON Error: {0}")]
    #[diagnostic(code(sbdl::infra::json))]
    Json(#[from] serde_json::Error),
}

// Manual implementation for shortcuts (e.g. `?` operator on duckdb calls)
impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}
