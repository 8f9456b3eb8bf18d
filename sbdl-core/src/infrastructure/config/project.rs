// sbdl-core/src/infrastructure/config/project.rs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::project::configuration::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;

const CONFIG_CANDIDATES: [&str; 2] = ["sbdl.yaml", "sbdl_project_conf.yaml"];

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    load_project_config_with(project_dir, |key| std::env::var(key).ok())
}

/// Même chose que `load_project_config`, mais la lecture des variables
/// d'environnement est injectée (les tests n'ont pas à toucher l'env du process).
pub fn load_project_config_with<F>(
    project_dir: &Path,
    lookup: F,
) -> Result<ProjectConfig, InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    // 2. Chargement YAML Base
    let content = fs::read_to_string(&config_path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // 3. Override via Variables d'Environnement (Pattern 'Layering')
    // Permet de faire: SBDL_TOPIC=sbdl_replay sbdl run --load-date 2024-01-15
    apply_env_overrides(&mut config, lookup);

    // 4. Validation (Fail-Fast avant toute lecture de partition)
    config.validate()?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CONFIG_CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CONFIG_CANDIDATES
    )))
}

fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SBDL_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = lookup("SBDL_DATA_DIR") {
        info!(old = ?config.source.data_dir, new = ?val, "Overriding data dir via ENV");
        config.source.data_dir = val;
    }
    if let Some(val) = lookup("SBDL_TOPIC") {
        info!(old = ?config.broker.topic, new = ?val, "Overriding topic via ENV");
        config.broker.topic = val;
    }
    if let Some(val) = lookup("SBDL_ENVIRONMENT") {
        info!(old = ?config.environment, new = ?val, "Overriding environment via ENV");
        config.environment = val;
    }
}
