// sbdl-core/src/ports/source.rs

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::model::PartitionInput;
use crate::error::SbdlError;

/// Supplies the three record sets of one load-date partition, fully
/// materialized. A partition that does not exist is an error; a partition
/// with zero accounts is not.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read_partition(&self, load_date: NaiveDate) -> Result<PartitionInput, SbdlError>;

    fn source_name(&self) -> &str;
}
