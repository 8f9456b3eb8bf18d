// sbdl/src/commands/run.rs
//
// USE CASE: Publish load-date partitions to the broker.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use comfy_table::{Table, presets::UTF8_FULL};
use sbdl_core::application::{PublicationRun, RunReport, cancellation};
use sbdl_core::infrastructure::adapters::{DuckDbSourceReader, broker_from_settings, resolve_data_dir};
use sbdl_core::infrastructure::config::load_project_config;

pub async fn execute(
    project_dir: PathBuf,
    load_dates: Vec<NaiveDate>,
    topic: Option<String>,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Load the Config (Infra)
    println!("⚙️  Loading configuration...");
    let mut config = load_project_config(&project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;
    if let Some(topic) = topic {
        config.broker.topic = topic;
    }
    println!("   Project: {} ({})", config.name, config.environment);

    // B. Adapters (Source + Broker)
    let data_dir = resolve_data_dir(&project_dir, &config.source.data_dir);
    let source = Arc::new(
        DuckDbSourceReader::new(&data_dir)
            .with_context(|| format!("Failed to initialize DuckDB reader on {:?}", data_dir))?,
    );
    let broker = broker_from_settings(&config.broker, &project_dir);
    println!(
        "   Broker: {} -> topic '{}' ({} partitions)",
        broker.broker_name(),
        config.broker.topic,
        config.broker.partitions
    );

    // C. Ctrl-C : plus aucune admission, le reste part en `incomplete`
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Interrupt received, stopping after in-flight sends...");
            handle.cancel();
        }
    });

    // D. Run (Application Layer)
    let target_dir = project_dir.join(&config.target_path);
    let run = PublicationRun::new(source, broker, &config).with_report_dir(&target_dir);

    match run.run(&load_dates, &signal).await {
        Ok(report) => {
            print_report(&report);
            if report.success {
                println!(
                    "\n✨ SUCCESS! {} envelopes published in {:.2?}",
                    report.total_succeeded(),
                    start.elapsed()
                );
            } else if report.cancelled {
                eprintln!("\n🛑 CANCELLED. See {}", target_dir.join("run_results.json").display());
                std::process::exit(1);
            } else {
                eprintln!(
                    "\n❌ FAILURE. {} envelopes failed. See {}",
                    report.total_failed(),
                    target_dir.join("run_results.json").display()
                );
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("\n💥 CRITICAL RUN ERROR: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Load date",
        "Status",
        "Accounts",
        "Published",
        "Failed",
        "Build errors",
        "Incomplete",
        "Retries",
        "DQ issues",
    ]);

    for p in &report.partitions {
        table.add_row(vec![
            p.load_date.to_string(),
            format!("{} {:?}", p.status.icon(), p.status),
            p.accounts_read.to_string(),
            p.succeeded.to_string(),
            p.failed.to_string(),
            p.build_failures.len().to_string(),
            p.incomplete.to_string(),
            p.retries.to_string(),
            p.data_quality.len().to_string(),
        ]);
    }

    println!("\n{table}");
}
