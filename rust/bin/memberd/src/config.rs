//! Server configuration file.
//!
//! ```toml
//! [service]
//! data_dir = "/var/lib/memberd"
//! listen = "0.0.0.0:8080"
//!
//! [service.pagination]
//! default_limit = 10
//! max_limit = 100
//!
//! [member]
//! id_prefix = "MBR-"
//! ```

use std::path::{Path, PathBuf};

use member::MemberConfig;
use memberd_core::ServiceConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub member: MemberConfig,
}

impl ServerConfig {
    /// A bare name resolves to `/etc/memberd/<name>.toml`; anything that
    /// looks like a path is used as given.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/memberd/{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Refuse to start on settings that would only fail later.
    pub fn verify(&self) -> anyhow::Result<()> {
        let pagination = self.service.pagination;
        if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
            anyhow::bail!(
                "invalid pagination: default_limit {} must be between 1 and max_limit {}",
                pagination.default_limit,
                pagination.max_limit
            );
        }
        if self.member.id_prefix.trim().is_empty() {
            anyhow::bail!("member.id_prefix is empty in configuration.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/memberd/prod.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./local.toml"),
            PathBuf::from("./local.toml")
        );
    }

    #[test]
    fn test_load_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memberd.toml");
        std::fs::write(
            &path,
            r#"
[service]
data_dir = "/srv/memberd"
listen = "127.0.0.1:9000"

[service.pagination]
max_limit = 50

[member]
id_prefix = "CUS-"
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.service.listen, "127.0.0.1:9000");
        assert_eq!(config.service.pagination.max_limit, 50);
        assert_eq!(config.service.pagination.default_limit, 10);
        assert_eq!(config.member.id_prefix, "CUS-");
        assert_eq!(
            config.service.resolve_sqlite_path(),
            PathBuf::from("/srv/memberd/data.sqlite")
        );
        config.verify().unwrap();
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.member.id_prefix, "MBR-");
        assert_eq!(config.service.listen, "0.0.0.0:8080");
        config.verify().unwrap();
    }

    #[test]
    fn test_verify_rejects_bad_pagination() {
        let mut config = ServerConfig::default();
        config.service.pagination.default_limit = 0;
        assert!(config.verify().is_err());

        let mut config = ServerConfig::default();
        config.service.pagination.default_limit = 200;
        assert!(config.verify().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(ServerConfig::load(Path::new("/nonexistent/memberd.toml")).is_err());
    }
}
