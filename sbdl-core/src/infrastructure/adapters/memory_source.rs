// sbdl-core/src/infrastructure/adapters/memory_source.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::model::PartitionInput;
use crate::error::SbdlError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::SourceReader;

/// Partitions held in memory, keyed by load date.
#[derive(Debug, Default, Clone)]
pub struct InMemorySourceReader {
    partitions: HashMap<NaiveDate, PartitionInput>,
}

impl InMemorySourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, load_date: NaiveDate, mut input: PartitionInput) -> Self {
        input.load_date = Some(load_date);
        self.partitions.insert(load_date, input);
        self
    }
}

#[async_trait]
impl SourceReader for InMemorySourceReader {
    async fn read_partition(&self, load_date: NaiveDate) -> Result<PartitionInput, SbdlError> {
        self.partitions.get(&load_date).cloned().ok_or_else(|| {
            InfrastructureError::PartitionMissing {
                table: "accounts".to_string(),
                load_date: load_date.to_string(),
                path: "memory".to_string(),
            }
            .into()
        })
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}
