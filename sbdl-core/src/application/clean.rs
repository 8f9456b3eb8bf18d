// sbdl-core/src/application/clean.rs

use crate::error::SbdlError;
use crate::infrastructure::config::project::load_project_config;
use std::fs;
use std::path::{Component, Path};

/// Removes the configured build artifacts. Returns the targets actually deleted.
pub fn clean_project(project_dir: &Path) -> Result<Vec<String>, SbdlError> {
    tracing::info!("🧹 Initializing SBDL cleanup sequence...");

    let config = load_project_config(project_dir)?;

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets
    };

    let mut removed = Vec::new();
    for target_rel_path in targets {
        // Zero-Trust Path Traversal Guard : ni chemin absolu, ni `..`
        let rel = Path::new(&target_rel_path);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || rel.as_os_str().is_empty() {
            return Err(SbdlError::UnsafePath(target_rel_path));
        }

        let full_path = project_dir.join(rel);
        if full_path.exists() {
            if full_path.is_dir() {
                fs::remove_dir_all(&full_path)?;
            } else {
                fs::remove_file(&full_path)?;
            }
            tracing::info!(target = %target_rel_path, "Artifact removed");
            removed.push(target_rel_path);
        }
    }

    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_removes_target_dir() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("sbdl.yaml"), "name: sbdl\n")?;
        fs::create_dir_all(dir.path().join("target/broker"))?;
        fs::write(dir.path().join("target/run_results.json"), "{}")?;

        let removed = clean_project(dir.path())?;

        assert_eq!(removed, vec!["target"]);
        assert!(!dir.path().join("target").exists());
        Ok(())
    }

    #[test]
    fn test_refuses_to_leave_project() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("sbdl.yaml"),
            "name: sbdl\nclean-targets: [\"../outside\"]\n",
        )?;

        let err = clean_project(dir.path()).unwrap_err();
        assert!(matches!(err, SbdlError::UnsafePath(_)));
        Ok(())
    }
}
