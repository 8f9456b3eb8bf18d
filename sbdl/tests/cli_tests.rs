use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Abstraction for managing the SBDL test environment (copy of `demo/`).
struct SbdlTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl SbdlTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let project_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .context("Workspace root not found")?
            .join("demo");

        let dest = tmp.path().join("demo");
        Self::copy_dir(&project_root, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let target = dst.join(entry.file_name());
            // Ignore les artefacts d'un run local
            if entry.file_name() == "target" {
                continue;
            }
            if entry.file_type()?.is_dir() {
                Self::copy_dir(&entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), target)?;
            }
        }
        Ok(())
    }

    fn sbdl(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sbdl"));
        cmd.current_dir(&self.root);
        cmd.env_remove("SBDL_TOPIC");
        cmd.env_remove("SBDL_TARGET_PATH");
        cmd.env_remove("SBDL_DATA_DIR");
        cmd
    }

    fn published_lines(&self) -> Result<Vec<serde_json::Value>> {
        let mut lines = Vec::new();
        for entry in fs::read_dir(self.root.join("target/broker"))? {
            let content = fs::read_to_string(entry?.path())?;
            for line in content.lines() {
                lines.push(serde_json::from_str(line)?);
            }
        }
        Ok(lines)
    }
}

#[test]
fn test_run_publishes_every_contract() -> Result<()> {
    let env = SbdlTestEnv::new()?;

    env.sbdl()
        .args(["run", "--load-date", "2024-01-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS"));

    let envelopes = env.published_lines()?;
    assert_eq!(envelopes.len(), 4);
    assert!(
        envelopes
            .iter()
            .all(|e| e["eventHeader"]["eventType"] == "SBDL-Contract")
    );

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        env.root.join("target/run_results.json"),
    )?)?;
    assert_eq!(report["success"], true);
    assert_eq!(report["partitions"][0]["succeeded"], 4);
    // 9823462813 has two address rows in the demo data
    assert_eq!(
        report["partitions"][0]["data_quality"][0]["kind"],
        "duplicate_address"
    );
    Ok(())
}

#[test]
fn test_run_topic_override() -> Result<()> {
    let env = SbdlTestEnv::new()?;

    env.sbdl()
        .args(["run", "--load-date", "2024-01-15", "--topic", "sbdl_replay"])
        .assert()
        .success();

    let names: Vec<String> = fs::read_dir(env.root.join("target/broker"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<std::io::Result<_>>()?;
    assert!(!names.is_empty());
    assert!(names.iter().all(|n| n.starts_with("sbdl_replay-")));
    Ok(())
}

#[test]
fn test_missing_partition_fails_run() -> Result<()> {
    let env = SbdlTestEnv::new()?;

    env.sbdl()
        .args(["run", "--load-date", "2024-01-16"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("CRITICAL RUN ERROR"));

    assert!(env.root.join("target/run_results.json").exists());
    Ok(())
}

#[test]
fn test_preview_prints_envelopes_without_publishing() -> Result<()> {
    let env = SbdlTestEnv::new()?;

    env.sbdl()
        .args(["preview", "--load-date", "2024-01-15", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"eventType\": \"SBDL-Contract\""))
        .stdout(predicate::str::contains("6982391060"))
        .stdout(predicate::str::contains("6982391061").not());

    assert!(!env.root.join("target/broker").exists());
    Ok(())
}

#[test]
fn test_clean_removes_target() -> Result<()> {
    let env = SbdlTestEnv::new()?;

    env.sbdl()
        .args(["run", "--load-date", "2024-01-15"])
        .assert()
        .success();
    assert!(env.root.join("target").exists());

    env.sbdl().arg("clean").assert().success();
    assert!(!env.root.join("target").exists());
    Ok(())
}

#[test]
fn test_run_without_config_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;

    Command::new(assert_cmd::cargo::cargo_bin!("sbdl"))
        .current_dir(tmp.path())
        .args(["run", "--load-date", "2024-01-15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load project configuration"));
    Ok(())
}
