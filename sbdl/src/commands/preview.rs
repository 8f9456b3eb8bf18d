// sbdl/src/commands/preview.rs
//
// USE CASE: Dry run, envelopes printed as pretty JSON.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use sbdl_core::application::preview_partition;
use sbdl_core::domain::envelope::EnvelopeBuilder;
use sbdl_core::domain::join::JoinAggregateEngine;
use sbdl_core::infrastructure::adapters::{DuckDbSourceReader, resolve_data_dir};
use sbdl_core::infrastructure::config::load_project_config;

pub async fn execute(project_dir: PathBuf, load_date: NaiveDate, limit: usize) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;

    let data_dir = resolve_data_dir(&project_dir, &config.source.data_dir);
    let source = DuckDbSourceReader::new(&data_dir)
        .with_context(|| format!("Failed to initialize DuckDB reader on {:?}", data_dir))?;
    let engine = JoinAggregateEngine::new(config.engine.clone());

    let preview = preview_partition(
        &source,
        &engine,
        &EnvelopeBuilder::default(),
        load_date,
        Some(limit),
    )
    .await
    .with_context(|| format!("Failed to preview partition {}", load_date))?;

    for envelope in &preview.envelopes {
        println!("{}", envelope.to_json_pretty()?);
    }

    for failure in &preview.build_failures {
        eprintln!("❌ {}: {}", failure.contract_identifier, failure.reason);
    }
    for issue in &preview.data_quality {
        let icon = if issue.is_rejection() { "🚫" } else { "⚠️ " };
        eprintln!("{} {}", icon, issue);
    }
    Ok(())
}
