// sbdl-core/src/application/report.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;

use crate::application::publisher::{FailedDelivery, PublishOutcome};
use crate::domain::quality::DataQualityIssue;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write_json;

pub const RUN_RESULTS_FILE: &str = "run_results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStatus {
    Succeeded,
    /// Failure rate above the configured threshold.
    Failed,
    Cancelled,
    /// Stopped by a systemic error (broker unreachable).
    Aborted,
}

impl PartitionStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Succeeded => "✅",
            Self::Failed => "❌",
            Self::Cancelled => "🛑",
            Self::Aborted => "💥",
        }
    }
}

/// Aggregate the builder refused to turn into an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildFailure {
    pub contract_identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionReport {
    pub load_date: NaiveDate,
    pub status: PartitionStatus,
    pub accounts_read: usize,
    pub envelopes_built: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub incomplete: usize,
    pub retries: u32,
    pub failure_rate: f64,
    pub failed_contracts: Vec<FailedDelivery>,
    pub incomplete_contracts: Vec<String>,
    pub build_failures: Vec<BuildFailure>,
    pub data_quality: Vec<DataQualityIssue>,
}

impl PartitionReport {
    /// Settles the status from the delivery ledger.
    ///
    /// The failure rate is `(delivery failures + build failures) / considered`,
    /// where considered counts every envelope attempted plus every build failure.
    pub fn from_outcome(
        load_date: NaiveDate,
        accounts_read: usize,
        outcome: PublishOutcome,
        build_failures: Vec<BuildFailure>,
        data_quality: Vec<DataQualityIssue>,
        failure_threshold: f64,
    ) -> Self {
        let failures = outcome.failed.len() + build_failures.len();
        let considered = outcome.considered() + build_failures.len();
        let failure_rate = if considered == 0 {
            0.0
        } else {
            failures as f64 / considered as f64
        };

        let status = if outcome.aborted {
            PartitionStatus::Aborted
        } else if outcome.cancelled {
            PartitionStatus::Cancelled
        } else if failure_rate > failure_threshold {
            PartitionStatus::Failed
        } else {
            PartitionStatus::Succeeded
        };

        Self {
            load_date,
            status,
            accounts_read,
            envelopes_built: outcome.considered(),
            succeeded: outcome.succeeded,
            failed: outcome.failed.len(),
            incomplete: outcome.incomplete.len(),
            retries: outcome.retries,
            failure_rate,
            failed_contracts: outcome.failed,
            incomplete_contracts: outcome.incomplete,
            build_failures,
            data_quality,
        }
    }

    /// Partition whose input could not be read; nothing was published.
    pub fn aborted(load_date: NaiveDate, accounts_read: usize) -> Self {
        Self {
            load_date,
            status: PartitionStatus::Aborted,
            accounts_read,
            envelopes_built: 0,
            succeeded: 0,
            failed: 0,
            incomplete: 0,
            retries: 0,
            failure_rate: 0.0,
            failed_contracts: Vec::new(),
            incomplete_contracts: Vec::new(),
            build_failures: Vec::new(),
            data_quality: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub cancelled: bool,
    /// Systemic error that stopped the run, if any.
    pub error: Option<String>,
    pub partitions: Vec<PartitionReport>,
}

impl RunReport {
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            success: false,
            cancelled: false,
            error: None,
            partitions: Vec::new(),
        }
    }

    pub fn push(&mut self, partition: PartitionReport) {
        if partition.status == PartitionStatus::Cancelled {
            self.cancelled = true;
        }
        self.partitions.push(partition);
    }

    /// Closes the report: success only when nothing failed, got cancelled or aborted.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        self.success = self.error.is_none()
            && !self.cancelled
            && self
                .partitions
                .iter()
                .all(|p| p.status == PartitionStatus::Succeeded);
    }

    pub fn total_succeeded(&self) -> usize {
        self.partitions.iter().map(|p| p.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.partitions
            .iter()
            .map(|p| p.failed + p.build_failures.len())
            .sum()
    }

    pub fn save(&self, target_dir: &Path) -> Result<(), InfrastructureError> {
        atomic_write_json(target_dir.join(RUN_RESULTS_FILE), self)
    }
}
