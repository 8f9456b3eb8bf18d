// sbdl-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `content` in one step: a reader of the file sees the
/// previous run's content or this one, never a half-written mix.
///
/// Missing parent directories are created first.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Le fichier temporaire doit vivre sur le même filesystem pour que le rename soit atomique
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_ref())?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Pretty JSON variant, used for run reports.
pub fn atomic_write_json<P: AsRef<Path>, T: Serialize>(
    path: P,
    value: &T,
) -> Result<(), InfrastructureError> {
    let content = serde_json::to_string_pretty(value)?;
    atomic_write(path, content)
}
