// sbdl-core/src/application/runner.rs
//
// Orchestrateur d'un run : pour chaque load date,
// Source -> Join/Aggregate -> Envelope -> Publisher, puis rapport.

use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::application::cancel::CancelSignal;
use crate::application::publisher::{PublishOutcome, Publisher, PublisherConfig};
use crate::application::report::{BuildFailure, PartitionReport, RunReport};
use crate::domain::envelope::EnvelopeBuilder;
use crate::domain::join::JoinAggregateEngine;
use crate::domain::project::ProjectConfig;
use crate::error::SbdlError;
use crate::ports::broker::MessageBroker;
use crate::ports::source::SourceReader;

pub struct PublicationRun {
    source: Arc<dyn SourceReader>,
    engine: JoinAggregateEngine,
    builder: EnvelopeBuilder,
    publisher: Publisher,
    failure_threshold: f64,
    report_dir: Option<PathBuf>,
}

impl PublicationRun {
    pub fn new(
        source: Arc<dyn SourceReader>,
        broker: Arc<dyn MessageBroker>,
        config: &ProjectConfig,
    ) -> Self {
        Self {
            source,
            engine: JoinAggregateEngine::new(config.engine.clone()),
            builder: EnvelopeBuilder::default(),
            publisher: Publisher::new(broker, PublisherConfig::from_project(config)),
            failure_threshold: config.publisher.failure_threshold,
            report_dir: None,
        }
    }

    /// Swap the builder (fixed clock and ids in tests).
    pub fn with_builder(mut self, builder: EnvelopeBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Persist `run_results.json` into this directory at the end of the run.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Publishes each load date in order.
    ///
    /// Per-record problems end up in the report. A systemic error (missing
    /// partition, unreachable broker) stops the run: the report is still
    /// persisted, then the error is returned.
    #[instrument(skip_all, fields(source = self.source.source_name(), partitions = load_dates.len()))]
    pub async fn run(
        &self,
        load_dates: &[NaiveDate],
        cancel: &CancelSignal,
    ) -> Result<RunReport, SbdlError> {
        let mut report = RunReport::start(Utc::now());

        for &load_date in load_dates {
            if cancel.is_cancelled() {
                warn!(%load_date, "🛑 Run cancelled, partition skipped");
                report.push(skipped(load_date, self.failure_threshold));
                continue;
            }

            let (partition, abort) = match self.publish_partition(load_date, cancel).await {
                Ok(settled) => settled,
                // Entrée illisible : rien n'a été publié pour cette date
                Err(err) => (PartitionReport::aborted(load_date, 0), Some(err)),
            };
            report.push(partition);

            if let Some(err) = abort {
                error!(%load_date, error = %err, "💥 Systemic failure, aborting run");
                report.error = Some(err.to_string());
                report.finish(Utc::now());
                self.persist(&report)?;
                return Err(err);
            }
        }

        report.finish(Utc::now());
        self.persist(&report)?;
        info!(
            success = report.success,
            published = report.total_succeeded(),
            failed = report.total_failed(),
            "Run finished"
        );
        Ok(report)
    }

    /// One load date, end to end.
    ///
    /// An unreachable broker still yields the partition report, built from the
    /// deliveries settled before the failure, with the error next to it.
    pub async fn publish_partition(
        &self,
        load_date: NaiveDate,
        cancel: &CancelSignal,
    ) -> Result<(PartitionReport, Option<SbdlError>), SbdlError> {
        info!(%load_date, "📦 Reading partition");
        let input = self.source.read_partition(load_date).await?;
        let prepared = self.engine.prepare(&input);

        let mut data_quality = prepared.warnings().to_vec();
        let mut build_failures = Vec::new();

        let envelopes = prepared.aggregates().filter_map(|item| match item {
            Ok(aggregate) => match self.builder.build(&aggregate) {
                Ok(envelope) => Some(envelope),
                Err(err) => {
                    warn!(contract = %aggregate.contract_identifier, error = %err, "Envelope build failed");
                    build_failures.push(BuildFailure {
                        contract_identifier: aggregate.contract_identifier,
                        reason: err.to_string(),
                    });
                    None
                }
            },
            Err(issue) => {
                data_quality.push(issue);
                None
            }
        });

        let (outcome, abort) = match self.publisher.publish(envelopes, cancel).await {
            Ok(outcome) => (outcome, None),
            Err(err) => {
                let partial = err.outcome().clone();
                (partial, Some(SbdlError::from(err)))
            }
        };

        let partition = PartitionReport::from_outcome(
            load_date,
            prepared.account_rows(),
            outcome,
            build_failures,
            data_quality,
            self.failure_threshold,
        );
        info!(
            %load_date,
            status = ?partition.status,
            succeeded = partition.succeeded,
            failed = partition.failed,
            incomplete = partition.incomplete,
            "{} Partition published",
            partition.status.icon()
        );
        Ok((partition, abort))
    }

    fn persist(&self, report: &RunReport) -> Result<(), SbdlError> {
        if let Some(dir) = &self.report_dir {
            report.save(dir)?;
        }
        Ok(())
    }
}

fn skipped(load_date: NaiveDate, failure_threshold: f64) -> PartitionReport {
    let outcome = PublishOutcome {
        cancelled: true,
        ..Default::default()
    };
    PartitionReport::from_outcome(load_date, 0, outcome, vec![], vec![], failure_threshold)
}
