//! Store configuration loading: database identity, engine and data directory.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::{
    engine::{DatabaseDescriptor, EngineConnector, memory::MemoryProfile},
    game::GAMES_TABLE,
};

/// Default location on disk where the configuration is looked up.
const DEFAULT_CONFIG_PATH: &str = "config/mystery_box.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MYSTERY_BOX_CONFIG_PATH";
/// Database opened when the configuration does not name one.
pub const DEFAULT_DATABASE_NAME: &str = "mystery-box";
/// Schema version requested when the configuration does not set one.
pub const DEFAULT_DATABASE_VERSION: u32 = 1;
const DEFAULT_DATA_DIR: &str = "data";

/// Engine backing the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// One SQLite file per database inside the data directory.
    Sqlite,
    /// Process-local storage, lost on exit.
    Memory,
}

/// Immutable store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the database to open.
    pub database_name: String,
    /// Requested schema version.
    pub version: u32,
    /// Tables that must exist.
    pub tables: Vec<String>,
    /// Engine to open the database with.
    pub engine: EngineKind,
    /// Directory holding the SQLite files.
    pub data_dir: PathBuf,
}

impl StoreConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        database = %config.database_name,
                        engine = ?config.engine,
                        "loaded store config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Descriptor of the database this configuration opens.
    pub fn descriptor(&self) -> DatabaseDescriptor {
        DatabaseDescriptor::new(self.database_name.clone(), self.version)
            .with_tables(self.tables.iter().cloned())
    }

    /// Connector for the configured engine.
    pub fn connector(&self) -> Arc<dyn EngineConnector> {
        match self.engine {
            EngineKind::Memory => Arc::new(MemoryProfile::new()),
            #[cfg(feature = "sqlite-store")]
            EngineKind::Sqlite => Arc::new(crate::dao::engine::sqlite::SqliteConnector::new(
                self.data_dir.clone(),
            )),
            #[cfg(not(feature = "sqlite-store"))]
            EngineKind::Sqlite => {
                warn!("built without the `sqlite-store` feature; using the in-memory engine");
                Arc::new(MemoryProfile::new())
            }
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.into(),
            version: DEFAULT_DATABASE_VERSION,
            tables: vec![GAMES_TABLE.into()],
            engine: EngineKind::Sqlite,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    database_name: Option<String>,
    version: Option<u32>,
    tables: Option<Vec<String>>,
    engine: Option<EngineKind>,
    data_dir: Option<PathBuf>,
}

impl From<RawConfig> for StoreConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = StoreConfig::default();
        Self {
            database_name: value.database_name.unwrap_or(defaults.database_name),
            version: value.version.unwrap_or(defaults.version),
            tables: value.tables.unwrap_or(defaults.tables),
            engine: value.engine.unwrap_or(defaults.engine),
            data_dir: value.data_dir.unwrap_or(defaults.data_dir),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.descriptor().tables, vec![GAMES_TABLE.to_string()]);
    }

    #[test]
    fn partial_file_overrides_only_given_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"databaseName": "party", "engine": "memory"}"#).unwrap();

        let config = StoreConfig::load_from(&path);

        assert_eq!(config.database_name, "party");
        assert_eq!(config.engine, EngineKind::Memory);
        assert_eq!(config.version, DEFAULT_DATABASE_VERSION);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(StoreConfig::load_from(&path), StoreConfig::default());
    }
}
