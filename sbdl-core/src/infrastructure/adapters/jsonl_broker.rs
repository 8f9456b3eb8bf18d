// sbdl-core/src/infrastructure/adapters/jsonl_broker.rs
//
// Sink local : chaque partition d'un topic est un fichier JSON-lines
// `<output_dir>/<topic>-<partition>.jsonl`, une enveloppe par ligne.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::partitioner::partition_for;
use crate::ports::broker::{BrokerError, BrokerRecord, DeliveryAck, MessageBroker};

struct PartitionFile {
    file: File,
    next_offset: u64,
}

pub struct JsonlFileBroker {
    output_dir: PathBuf,
    partitions: u32,
    files: Mutex<HashMap<(String, u32), PartitionFile>>,
}

fn io_failure(path: &Path, err: std::io::Error) -> BrokerError {
    BrokerError::Unreachable(format!("{}: {}", path.display(), err))
}

impl JsonlFileBroker {
    pub fn new(output_dir: impl Into<PathBuf>, partitions: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            partitions: partitions.max(1),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn partition_path(&self, topic: &str, partition: u32) -> PathBuf {
        self.output_dir.join(format!("{}-{}.jsonl", topic, partition))
    }

    async fn open(&self, topic: &str, partition: u32) -> Result<PartitionFile, BrokerError> {
        let path = self.partition_path(topic, partition);
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| io_failure(&self.output_dir, e))?;

        // Les offsets reprennent après les lignes déjà présentes
        let next_offset = match fs::read(&path).await {
            Ok(bytes) => bytes.iter().filter(|b| **b == b'\n').count() as u64,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(io_failure(&path, e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_failure(&path, e))?;

        debug!(path = ?path, next_offset, "Partition file opened");
        Ok(PartitionFile { file, next_offset })
    }
}

#[async_trait]
impl MessageBroker for JsonlFileBroker {
    async fn send(&self, record: BrokerRecord) -> Result<DeliveryAck, BrokerError> {
        if record.payload.contains('\n') {
            return Err(BrokerError::Rejected(
                "payload must be a single JSON line".to_string(),
            ));
        }

        let partition = partition_for(&record.key, self.partitions);
        let slot = (record.topic.clone(), partition);

        let mut files = self.files.lock().await;
        if !files.contains_key(&slot) {
            let opened = self.open(&record.topic, partition).await?;
            files.insert(slot.clone(), opened);
        }
        let target = files
            .get_mut(&slot)
            .ok_or_else(|| BrokerError::Unreachable("partition file vanished".to_string()))?;

        let mut line = record.payload.into_bytes();
        line.push(b'\n');
        let path = self.partition_path(&slot.0, partition);
        target
            .file
            .write_all(&line)
            .await
            .map_err(|e| io_failure(&path, e))?;
        // Pas d'ack tant que la ligne n'a pas quitté le buffer de tokio
        target.file.flush().await.map_err(|e| io_failure(&path, e))?;

        let offset = target.next_offset;
        target.next_offset += 1;
        Ok(DeliveryAck { partition, offset })
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        let mut files = self.files.lock().await;
        for ((topic, partition), target) in files.iter_mut() {
            target
                .file
                .flush()
                .await
                .map_err(|e| io_failure(&self.partition_path(topic, *partition), e))?;
        }
        Ok(())
    }

    fn broker_name(&self) -> &str {
        "jsonl"
    }
}
