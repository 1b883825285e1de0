use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::PaginationConfig;

/// Storage and listener settings shared by every module.
///
/// Deserialized from the `[service]` table of the server config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the database file.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    /// Listen address for the HTTP server.
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            listen: default_listen(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
