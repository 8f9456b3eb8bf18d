// sbdl-core/src/infrastructure/adapters/mod.rs

pub mod duckdb_source;
pub mod jsonl_broker;
pub mod memory_broker;
pub mod memory_source;
pub mod partitioner;

use std::path::Path;
use std::sync::Arc;

use crate::domain::project::{BrokerKind, BrokerSettings};
use crate::ports::broker::MessageBroker;

pub use duckdb_source::{DuckDbSourceReader, resolve_data_dir};
pub use jsonl_broker::JsonlFileBroker;
pub use memory_broker::InMemoryBroker;
pub use memory_source::InMemorySourceReader;

/// Instancie le broker décrit par la config (chemins relatifs résolus sur `project_dir`).
pub fn broker_from_settings(settings: &BrokerSettings, project_dir: &Path) -> Arc<dyn MessageBroker> {
    match settings.kind {
        BrokerKind::Jsonl => Arc::new(JsonlFileBroker::new(
            resolve_data_dir(project_dir, &settings.output_dir),
            settings.partitions,
        )),
        BrokerKind::Memory => Arc::new(InMemoryBroker::new(settings.partitions)),
    }
}
