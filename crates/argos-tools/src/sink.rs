//! Write-once file sink for downloaded logs and generated reports

use std::path::{Component, Path, PathBuf};

use argos_core::{ArgosError, ArgosResult};
use tracing::debug;

/// Write `contents` to `path`, creating parent directories. Returns the size in KB.
pub async fn write_report(path: &Path, contents: &[u8]) -> ArgosResult<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArgosError::tool(format!("creating output directory: {}", e)))?;
    }

    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ArgosError::tool(format!("writing {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), bytes = contents.len(), "Wrote report");
    Ok(size_kb(contents.len() as u64))
}

pub fn size_kb(bytes: u64) -> u64 {
    bytes / 1024
}

/// Join a caller-supplied relative path under `base`, refusing anything that
/// could escape it
pub fn join_relative(base: &Path, relative: &str) -> ArgosResult<PathBuf> {
    let rel = Path::new(relative);
    if relative.is_empty() {
        return Err(ArgosError::invalid_argument("path must not be empty"));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(ArgosError::invalid_argument(format!(
                    "path '{}' must be relative and stay inside the output directory",
                    relative
                )))
            }
        }
    }
    Ok(base.join(rel))
}
