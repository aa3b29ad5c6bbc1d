use std::path::{Path, PathBuf};

use migrun_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Reads `AppConfig` from YAML or TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.migrun/config.yml`, or `None` when no home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".migrun").join("config.yml"))
    }

    /// Load an explicit config file. The parser is picked by extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise the default file when it exists,
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load(&default),
            _ => {
                debug!("no config file found, using defaults");
                Ok(AppConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_yaml_with_partial_database_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "config.yml",
            "database:\n  path: /tmp/app.db\n  ledger_table: schema_log\n",
        );

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/app.db"));
        assert_eq!(config.database.ledger_table, "schema_log");
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "config.toml",
            "[database]\npath = \"data.db\"\nbusy_timeout_ms = 250\n",
        );

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("data.db"));
        assert_eq!(config.database.ledger_table, "_migrations");
        assert_eq!(config.database.busy_timeout_ms, 250);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config.ini", "[database]");

        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config extension: ini"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        assert!(ConfigLoader::load_or_default(Some(&path)).is_err());
    }
}
