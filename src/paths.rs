//! Where database files live.

use crate::error::{ModelError, ModelResult};
use std::path::{Path, PathBuf};

/// Environment variable that redirects every database file into one
/// directory.
pub const DB_DIR_ENV: &str = "LITEMODEL_DB_DIR";

/// `<platform data dir>/litemodel`, or the working directory when the
/// platform has no data dir.
pub fn default_location() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("litemodel"))
        .unwrap_or_else(|| PathBuf::from("./"))
}

/// Resolve the file for database `name`.
///
/// Order: `env_dir` (only the base name of `name` is kept), then `name`
/// itself when it contains a path separator, then `location`, then
/// [`default_location`].
pub fn resolve_db_path(name: &str, location: Option<&Path>, env_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = env_dir {
        let base = Path::new(name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(name));
        return dir.join(base);
    }

    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(name);
    }

    match location {
        Some(dir) => dir.join(name),
        None => default_location().join(name),
    }
}

/// [`resolve_db_path`] with the override read from [`DB_DIR_ENV`].
pub fn resolve_from_env(name: &str, location: Option<&Path>) -> PathBuf {
    let env_dir = std::env::var_os(DB_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve_db_path(name, location, env_dir.as_deref())
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> ModelResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ModelError::Connection(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
            tracing::debug!(dir = %parent.display(), "created database directory");
        }
    }
    Ok(())
}
