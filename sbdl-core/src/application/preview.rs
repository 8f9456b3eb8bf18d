// sbdl-core/src/application/preview.rs

use chrono::NaiveDate;
use tracing::info;

use crate::application::report::BuildFailure;
use crate::domain::envelope::{Envelope, EnvelopeBuilder};
use crate::domain::join::JoinAggregateEngine;
use crate::domain::quality::DataQualityIssue;
use crate::error::SbdlError;
use crate::ports::source::SourceReader;

/// Envelopes of one partition, built but not published.
#[derive(Debug, Default)]
pub struct Preview {
    pub envelopes: Vec<Envelope>,
    pub build_failures: Vec<BuildFailure>,
    pub data_quality: Vec<DataQualityIssue>,
}

/// Dry run of Source -> Join -> Envelope. Stops after `limit` envelopes.
pub async fn preview_partition(
    source: &dyn SourceReader,
    engine: &JoinAggregateEngine,
    builder: &EnvelopeBuilder,
    load_date: NaiveDate,
    limit: Option<usize>,
) -> Result<Preview, SbdlError> {
    let input = source.read_partition(load_date).await?;
    let prepared = engine.prepare(&input);

    let mut preview = Preview {
        data_quality: prepared.warnings().to_vec(),
        ..Default::default()
    };
    let limit = limit.unwrap_or(usize::MAX);

    for item in prepared.aggregates() {
        if preview.envelopes.len() >= limit {
            break;
        }
        match item {
            Ok(aggregate) => match builder.build(&aggregate) {
                Ok(envelope) => preview.envelopes.push(envelope),
                Err(err) => preview.build_failures.push(BuildFailure {
                    contract_identifier: aggregate.contract_identifier,
                    reason: err.to_string(),
                }),
            },
            Err(issue) => preview.data_quality.push(issue),
        }
    }

    info!(%load_date, envelopes = preview.envelopes.len(), "Preview built");
    Ok(preview)
}
