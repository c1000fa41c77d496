use std::env;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::manifest::ManifestFilter;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub survey: SurveyConfig,
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load configuration from the environment plus the optional survey TOML
    /// file named by `SURVEY_CONFIG` (default `survey.toml`). A missing file
    /// yields the built-in defaults; a malformed file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let survey_path =
            PathBuf::from(env::var("SURVEY_CONFIG").unwrap_or_else(|_| "survey.toml".to_string()));
        let mut survey = SurveyConfig::from_path(&survey_path)?;

        if let Ok(root) = env::var("SURVEY_STORAGE") {
            survey.storage.root = PathBuf::from(root);
        }
        if let Ok(fallback) = env::var("SURVEY_STORAGE_FALLBACK") {
            survey.storage.fallback_root = Some(PathBuf::from(fallback));
        }

        let admin_token = env::var("SURVEY_ADMIN_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            survey,
            admin_token,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// One image-generation source participating in the study.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderRoot {
    pub name: String,
    pub root: PathBuf,
}

/// Per-module item targets for a rater's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModuleItems {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl Default for ModuleItems {
    fn default() -> Self {
        Self { a: 24, b: 12, c: 12 }
    }
}

/// Where response files land. The fallback root is used when the primary
/// cannot be created (e.g. an unmounted research drive).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub fallback_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("survey_results"),
            fallback_root: None,
        }
    }
}

impl StorageConfig {
    /// Resolve the directory responses are written to, creating it on the
    /// way. Falls back to `fallback_root` when the primary is not creatable.
    pub fn resolve_root(&self) -> Result<PathBuf, ConfigError> {
        match fs::create_dir_all(&self.root) {
            Ok(()) => Ok(self.root.clone()),
            Err(primary) => {
                let Some(fallback) = &self.fallback_root else {
                    return Err(ConfigError::Storage {
                        path: self.root.clone(),
                        source: primary,
                    });
                };
                fs::create_dir_all(fallback).map_err(|source| ConfigError::Storage {
                    path: fallback.clone(),
                    source,
                })?;
                Ok(fallback.clone())
            }
        }
    }
}

/// Structured survey settings, usually read from `survey.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub providers: Vec<ProviderRoot>,
    pub seed_labels: Vec<u32>,
    pub module_items: ModuleItems,
    pub filter: ManifestFilter,
    pub storage: StorageConfig,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        let providers = ["chatgpt", "google", "stability", "bfl"]
            .into_iter()
            .map(|name| ProviderRoot {
                name: name.to_string(),
                root: Path::new("research").join(name),
            })
            .collect();

        Self {
            providers,
            seed_labels: vec![11, 23, 37, 53, 71],
            module_items: ModuleItems::default(),
            filter: ManifestFilter::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl SurveyConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::File {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|provider| provider.name.clone())
            .collect()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::File { path, .. } => {
                write!(f, "could not read survey config {}", path.display())
            }
            ConfigError::Parse { path, .. } => {
                write!(f, "survey config {} is not valid TOML", path.display())
            }
            ConfigError::Storage { path, .. } => {
                write!(f, "could not create storage directory {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::File { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Storage { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("SURVEY_CONFIG");
        env::remove_var("SURVEY_STORAGE");
        env::remove_var("SURVEY_STORAGE_FALLBACK");
        env::remove_var("SURVEY_ADMIN_TOKEN");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SURVEY_CONFIG", "./does-not-exist.toml");
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.survey.providers.len(), 4);
        assert_eq!(config.survey.seed_labels, vec![11, 23, 37, 53, 71]);
        assert!(config.admin_token.is_none());
        reset_env();
    }

    #[test]
    fn storage_env_overrides_survey_file() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SURVEY_CONFIG", "./does-not-exist.toml");
        env::set_var("SURVEY_STORAGE", "/srv/survey");
        env::set_var("SURVEY_STORAGE_FALLBACK", "/tmp/survey");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.survey.storage.root, PathBuf::from("/srv/survey"));
        assert_eq!(
            config.survey.storage.fallback_root,
            Some(PathBuf::from("/tmp/survey"))
        );
        reset_env();
    }

    #[test]
    fn survey_toml_round_trips() {
        let raw = r#"
            seed_labels = [1, 2, 3]

            [[providers]]
            name = "chatgpt"
            root = "/data/chatgpt"

            [module_items]
            a = 6
            b = 4
            c = 2

            [filter]
            status_ok_only = false
            require_1k_square = true

            [storage]
            root = "/data/results"
            fallback_root = "/tmp/results"
        "#;
        let config: SurveyConfig = toml::from_str(raw).expect("valid survey toml");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "chatgpt");
        assert_eq!(config.seed_labels, vec![1, 2, 3]);
        assert_eq!(config.module_items.a, 6);
        assert!(!config.filter.status_ok_only);
        assert!(config.filter.require_1k_square);
        assert_eq!(
            config.storage.fallback_root,
            Some(PathBuf::from("/tmp/results"))
        );
    }

    #[test]
    fn resolve_root_prefers_primary_then_fallback() {
        let primary = tempfile::tempdir().expect("tempdir");
        let storage = StorageConfig {
            root: primary.path().join("results"),
            fallback_root: None,
        };
        let resolved = storage.resolve_root().expect("primary resolves");
        assert_eq!(resolved, primary.path().join("results"));

        let fallback = tempfile::tempdir().expect("tempdir");
        let storage = StorageConfig {
            // A file in the way makes the primary uncreatable.
            root: blocked_root(primary.path()),
            fallback_root: Some(fallback.path().join("results")),
        };
        let resolved = storage.resolve_root().expect("fallback resolves");
        assert_eq!(resolved, fallback.path().join("results"));
    }

    fn blocked_root(dir: &Path) -> PathBuf {
        let file = dir.join("occupied");
        fs::write(&file, b"x").expect("write blocker");
        file.join("nested")
    }
}
