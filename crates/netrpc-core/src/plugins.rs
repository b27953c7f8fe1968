//! Plugin discovery.
//!
//! Plugins are executables dropped into `<user-config-dir>/netrpc/plugins`.
//! Discovery is a non-recursive listing; directories are skipped and a
//! missing plugins directory simply means there are no plugins.

use crate::config::AppConfig;
use crate::error::{NetRpcError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A discovered plugin binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginEntry {
    /// File name of the plugin.
    pub name: String,
    pub path: PathBuf,
}

/// Default plugins directory for the current user.
pub fn plugins_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        NetRpcError::Other("Could not determine user config directory".to_string())
    })?;
    Ok(config_dir
        .join(AppConfig::APP_NAME)
        .join(AppConfig::PLUGINS_DIR_NAME))
}

/// List plugin files in `dir`, sorted by name.
pub fn discover(dir: &Path) -> Result<Vec<PluginEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No plugins directory at {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(NetRpcError::Io {
                message: format!("Failed to read plugins directory {}: {}", dir.display(), e),
                source: Some(e),
            });
        }
    };

    let mut plugins = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        plugins.push(PluginEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
        });
    }

    plugins.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Found {} plugins in {}", plugins.len(), dir.display());
    Ok(plugins)
}

/// List plugins in the default plugins directory.
pub fn discover_default() -> Result<Vec<PluginEntry>> {
    discover(&plugins_dir()?)
}
