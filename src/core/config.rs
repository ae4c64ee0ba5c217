/*
 * Persisted user settings: the token accounting surcharge, the minimum size of
 * a reported duplicate group, the preferred tokenizer and the last document
 * that was opened. Settings live in `config.json` inside the per-user config
 * directory resolved by `path_utils`.
 *
 * Access goes through `ConfigManagerOperations` so the application logic can be
 * tested against an in-memory implementation. A missing settings file is not an
 * error; it yields the defaults.
 */
use crate::core::duplicates::DEFAULT_MIN_DUPLICATE_GROUP_SIZE;
use crate::core::path_utils;
use crate::core::token_accounting::DEFAULT_LINE_BREAK_SURCHARGE;
use crate::core::tokenizer_utils::TokenizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NoProjectDirectory,
    Json(serde_json::Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine the configuration directory")
            }
            ConfigError::Json(e) => write!(f, "Configuration file is not valid JSON: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::NoProjectDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/* Unknown or absent fields fall back to their defaults when loading. */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrunerConfig {
    pub line_break_surcharge: usize,
    pub min_duplicate_group_size: usize,
    pub tokenizer: TokenizerKind,
    pub last_document_path: Option<PathBuf>,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        PrunerConfig {
            line_break_surcharge: DEFAULT_LINE_BREAK_SURCHARGE,
            min_duplicate_group_size: DEFAULT_MIN_DUPLICATE_GROUP_SIZE,
            tokenizer: TokenizerKind::default(),
            last_document_path: None,
        }
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<PrunerConfig>;
    fn save_config(&self, app_name: &str, config: &PrunerConfig) -> Result<()>;
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_config(&self, app_name: &str) -> Result<PrunerConfig> {
        log::trace!("CoreConfigManager: Loading config for app '{app_name}'");
        let file_path = path_utils::get_config_file_path(app_name, CONFIG_FILENAME)
            .ok_or(ConfigError::NoProjectDirectory)?;
        read_config_file(&file_path)
    }

    fn save_config(&self, app_name: &str, config: &PrunerConfig) -> Result<()> {
        log::trace!("CoreConfigManager: Saving config for app '{app_name}'");
        let file_path = path_utils::get_config_file_path(app_name, CONFIG_FILENAME)
            .ok_or(ConfigError::NoProjectDirectory)?;
        write_config_file(&file_path, config)
    }
}

pub(crate) fn read_config_file(file_path: &Path) -> Result<PrunerConfig> {
    if !file_path.exists() {
        log::debug!("CoreConfigManager: Config file {file_path:?} does not exist, using defaults.");
        return Ok(PrunerConfig::default());
    }
    let contents = fs::read_to_string(file_path)?;
    if contents.trim().is_empty() {
        log::debug!("CoreConfigManager: Config file {file_path:?} is empty, using defaults.");
        return Ok(PrunerConfig::default());
    }
    let config: PrunerConfig = serde_json::from_str(&contents)?;
    log::debug!("CoreConfigManager: Loaded config from {file_path:?}: {config:?}");
    Ok(config)
}

pub(crate) fn write_config_file(file_path: &Path, config: &PrunerConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(file_path, json)?;
    log::debug!("CoreConfigManager: Saved config to {file_path:?}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Same file handling as CoreConfigManager, rooted in a temp directory.
    struct TestConfigManager {
        mock_config_dir: PathBuf,
    }

    impl ConfigManagerOperations for TestConfigManager {
        fn load_config(&self, _app_name: &str) -> Result<PrunerConfig> {
            read_config_file(&self.mock_config_dir.join(CONFIG_FILENAME))
        }

        fn save_config(&self, _app_name: &str, config: &PrunerConfig) -> Result<()> {
            write_config_file(&self.mock_config_dir.join(CONFIG_FILENAME), config)
        }
    }

    fn manager() -> (tempfile::TempDir, TestConfigManager) {
        let dir = tempdir().unwrap();
        let manager = TestConfigManager {
            mock_config_dir: dir.path().to_path_buf(),
        };
        (dir, manager)
    }

    #[test]
    fn test_load_without_file_returns_defaults() {
        let (_dir, manager) = manager();
        let config = manager.load_config("app").unwrap();
        assert_eq!(config, PrunerConfig::default());
        assert_eq!(config.line_break_surcharge, 1);
        assert_eq!(config.min_duplicate_group_size, 3);
        assert_eq!(config.tokenizer, TokenizerKind::Tiktoken);
        assert!(config.last_document_path.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, manager) = manager();
        let config = PrunerConfig {
            line_break_surcharge: 0,
            min_duplicate_group_size: 2,
            tokenizer: TokenizerKind::Approximate,
            last_document_path: Some(PathBuf::from("/docs/llms-full.txt")),
        };
        manager.save_config("app", &config).unwrap();
        assert_eq!(manager.load_config("app").unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let (dir, manager) = manager();
        fs::write(dir.path().join(CONFIG_FILENAME), r#"{ "tokenizer": "approximate" }"#).unwrap();
        let config = manager.load_config("app").unwrap();
        assert_eq!(config.tokenizer, TokenizerKind::Approximate);
        assert_eq!(config.min_duplicate_group_size, DEFAULT_MIN_DUPLICATE_GROUP_SIZE);
    }

    #[test]
    fn test_empty_file_returns_defaults() {
        let (dir, manager) = manager();
        fs::write(dir.path().join(CONFIG_FILENAME), "  \n").unwrap();
        assert_eq!(manager.load_config("app").unwrap(), PrunerConfig::default());
    }

    #[test]
    fn test_malformed_file_is_a_json_error() {
        let (dir, manager) = manager();
        fs::write(dir.path().join(CONFIG_FILENAME), "{ not json").unwrap();
        let err = manager.load_config("app").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_core_config_manager_round_trip() {
        let app_name = format!("LlmsPrunerTest_Config_{}", rand::random::<u64>());
        let manager = CoreConfigManager::new();
        let config = PrunerConfig {
            last_document_path: Some(PathBuf::from("llms.txt")),
            ..PrunerConfig::default()
        };
        manager.save_config(&app_name, &config).unwrap();
        assert_eq!(manager.load_config(&app_name).unwrap(), config);

        if let Some(dir) = path_utils::get_base_app_config_local_dir(&app_name) {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
