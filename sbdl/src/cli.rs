// sbdl/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sbdl")]
#[command(about = "Golden-copy contract publisher (Accounts ⋈ Parties ⋈ Addresses -> CDC envelopes)", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Publishes one or more load-date partitions to the broker
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Partition(s) to publish, YYYY-MM-DD (repeatable)
        #[arg(long = "load-date", required = true, num_args = 1..)]
        load_dates: Vec<NaiveDate>,

        /// Override the topic from sbdl.yaml
        #[arg(long)]
        topic: Option<String>,
    },

    /// 👀 Builds the envelopes of one partition and prints them, nothing is published
    Preview {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long)]
        load_date: NaiveDate,

        /// Number of envelopes to print
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// 🧹 Cleans build artifacts (target/ folder)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    fn date(s: &str) -> Result<NaiveDate> {
        Ok(s.parse()?)
    }

    #[test]
    fn test_cli_parse_run_defaults() -> Result<()> {
        let args = Cli::try_parse_from(["sbdl", "run", "--load-date", "2024-01-15"])?;
        match args.command {
            Commands::Run {
                project_dir,
                load_dates,
                topic,
            } => {
                assert_eq!(project_dir.to_string_lossy(), ".");
                assert_eq!(load_dates, vec![date("2024-01-15")?]);
                assert_eq!(topic, None);
                Ok(())
            }
            _ => bail!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_many_dates_and_topic() -> Result<()> {
        let args = Cli::try_parse_from([
            "sbdl",
            "run",
            "--load-date",
            "2024-01-15",
            "2024-01-16",
            "--topic",
            "sbdl_replay",
            "--project-dir",
            "/tmp",
        ])?;
        match args.command {
            Commands::Run {
                project_dir,
                load_dates,
                topic,
            } => {
                assert_eq!(project_dir.to_string_lossy(), "/tmp");
                assert_eq!(load_dates.len(), 2);
                assert_eq!(topic.as_deref(), Some("sbdl_replay"));
                Ok(())
            }
            _ => bail!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_requires_load_date() {
        assert!(Cli::try_parse_from(["sbdl", "run"]).is_err());
    }

    #[test]
    fn test_cli_rejects_malformed_date() {
        assert!(Cli::try_parse_from(["sbdl", "run", "--load-date", "15/01/2024"]).is_err());
    }

    #[test]
    fn test_cli_parse_preview() -> Result<()> {
        let args = Cli::try_parse_from(["sbdl", "preview", "--load-date", "2024-01-15"])?;
        match args.command {
            Commands::Preview {
                load_date, limit, ..
            } => {
                assert_eq!(load_date, date("2024-01-15")?);
                assert_eq!(limit, 5);
                Ok(())
            }
            _ => bail!("Expected Preview command"),
        }
    }
}
