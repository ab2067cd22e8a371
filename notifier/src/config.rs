use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;

pub const ENV_CONFIG_FILE: &str = "INPUT_CONFIG_FILE";
pub const ENV_BACKEND: &str = "INPUT_BACKEND";
pub const ENV_API_URL: &str = "INPUT_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "INPUT_ACCESS_TOKEN";
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const ENV_SQLITE_PATH: &str = "INPUT_SQLITE_PATH";
pub const ENV_TIMEOUT_SECS: &str = "INPUT_TIMEOUT_SECS";
pub const ENV_DRY_RUN: &str = "INPUT_DRY_RUN";
pub const ENV_FAIL_ON_INSERT_ERROR: &str = "INPUT_FAIL_ON_INSERT_ERROR";
pub const ENV_LOG_LEVEL: &str = "INPUT_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "INPUT_LOG_FILE";

pub const DEFAULT_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Bigquery,
    Sqlite,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" | "bq" => Ok(Backend::Bigquery),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(anyhow!("Unknown backend '{}'. Use bigquery or sqlite", other)),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub access_token: Option<String>,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    pub timeout_secs: Option<u64>,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }
fn default_sqlite_path() -> PathBuf { PathBuf::from("bq-notify.db") }

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_url: default_api_url(),
            access_token: None,
            sqlite_path: default_sqlite_path(),
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("backend", &self.backend)
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("sqlite_path", &self.sqlite_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub output: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.level
            .parse()
            .map_err(|_| anyhow!("Invalid log level '{}'", self.level))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BehaviorConfig {
    /// Build and log the payload without writing it.
    #[serde(default)]
    pub dry_run: bool,
    /// Exit non-zero when rows were rejected or the insert call failed.
    #[serde(default)]
    pub fail_on_insert_error: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings file named by `INPUT_CONFIG_FILE` (if any), overlaid with
    /// the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match non_empty(&lookup, ENV_CONFIG_FILE) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_lookup(lookup)?;
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(settings)
    }

    /// Detect file type by extension and load
    pub fn from_file(path: &Path) -> Result<Self> {
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "toml" => Self::from_toml_file(path),
            _ => Err(anyhow!("Unsupported config file format. Use .yaml, .yml, or .toml")),
        }
    }

    /// Overlay environment values, preferring them over what is already set
    pub fn apply_lookup<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = non_empty(&lookup, ENV_BACKEND) {
            self.warehouse.backend = backend.parse()?;
        }
        if let Some(url) = non_empty(&lookup, ENV_API_URL) {
            self.warehouse.api_url = url;
        }
        if let Some(token) = non_empty(&lookup, ENV_ACCESS_TOKEN)
            .or_else(|| non_empty(&lookup, ENV_GOOGLE_ACCESS_TOKEN))
        {
            self.warehouse.access_token = Some(token);
        }
        if let Some(path) = non_empty(&lookup, ENV_SQLITE_PATH) {
            self.warehouse.sqlite_path = PathBuf::from(path);
        }
        if let Some(secs) = non_empty(&lookup, ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            self.warehouse.timeout_secs = Some(secs).filter(|s| *s > 0);
        }

        if let Some(dry_run) = env_bool(&lookup, ENV_DRY_RUN)? {
            self.behavior.dry_run = dry_run;
        }
        if let Some(fail) = env_bool(&lookup, ENV_FAIL_ON_INSERT_ERROR)? {
            self.behavior.fail_on_insert_error = fail;
        }

        if let Some(level) = non_empty(&lookup, ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(output) = non_empty(&lookup, ENV_LOG_FILE) {
            self.logging.output = Some(PathBuf::from(output));
        }
        self.logging.level_filter()?;

        Ok(())
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = non_empty(lookup, key) else {
        return Ok(None);
    };
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => bail!("{} must be true or false, got '{}'", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.warehouse.backend, Backend::Bigquery);
        assert_eq!(settings.warehouse.api_url, DEFAULT_API_URL);
        assert_eq!(settings.warehouse.access_token, None);
        assert_eq!(settings.warehouse.timeout_secs, None);
        assert!(!settings.behavior.dry_run);
        assert!(!settings.behavior.fail_on_insert_error);
        assert_eq!(settings.logging.level_filter().unwrap(), log::LevelFilter::Info);
    }

    #[test]
    fn environment_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_BACKEND, "SQLite"),
            (ENV_SQLITE_PATH, "/tmp/events.db"),
            (ENV_TIMEOUT_SECS, "15"),
            (ENV_DRY_RUN, "true"),
            (ENV_FAIL_ON_INSERT_ERROR, "yes"),
            (ENV_LOG_LEVEL, "debug"),
        ]))
        .unwrap();
        assert_eq!(settings.warehouse.backend, Backend::Sqlite);
        assert_eq!(settings.warehouse.sqlite_path, PathBuf::from("/tmp/events.db"));
        assert_eq!(settings.warehouse.timeout_secs, Some(15));
        assert!(settings.behavior.dry_run);
        assert!(settings.behavior.fail_on_insert_error);
        assert_eq!(settings.logging.level_filter().unwrap(), log::LevelFilter::Debug);
    }

    #[test]
    fn access_token_falls_back_to_google_variable() {
        let settings = Settings::from_lookup(lookup_from(&[(ENV_GOOGLE_ACCESS_TOKEN, "ya29.abc")])).unwrap();
        assert_eq!(settings.warehouse.access_token.as_deref(), Some("ya29.abc"));

        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_GOOGLE_ACCESS_TOKEN, "ya29.abc"),
            (ENV_ACCESS_TOKEN, "explicit"),
        ]))
        .unwrap();
        assert_eq!(settings.warehouse.access_token.as_deref(), Some("explicit"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let mut config = WarehouseConfig::default();
        config.access_token = Some("secret-token".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn rejects_unknown_backend_and_level() {
        assert!(Settings::from_lookup(lookup_from(&[(ENV_BACKEND, "postgres")])).is_err());
        assert!(Settings::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "loud")])).is_err());
        assert!(Settings::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "soon")])).is_err());
    }

    #[test]
    fn misspelled_boolean_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[(ENV_FAIL_ON_INSERT_ERROR, "ture")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "INPUT_FAIL_ON_INSERT_ERROR must be true or false, got 'ture'"
        );

        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_DRY_RUN, "Off"),
            (ENV_FAIL_ON_INSERT_ERROR, "0"),
        ]))
        .unwrap();
        assert!(!settings.behavior.dry_run);
        assert!(!settings.behavior.fail_on_insert_error);
    }

    #[test]
    fn yaml_file_is_overlaid_by_environment() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "warehouse:\n  backend: sqlite\n  sqlite_path: from-file.db\nbehavior:\n  dry_run: true\nlogging:\n  level: warn"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_CONFIG_FILE, path.as_str()),
            (ENV_DRY_RUN, "false"),
        ]))
        .unwrap();
        assert_eq!(settings.warehouse.backend, Backend::Sqlite);
        assert_eq!(settings.warehouse.sqlite_path, PathBuf::from("from-file.db"));
        assert!(!settings.behavior.dry_run);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn toml_file_loads() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[warehouse]\napi_url = \"http://localhost:9050/bigquery/v2\"\ntimeout_secs = 5\n\n[behavior]\nfail_on_insert_error = true"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.warehouse.api_url, "http://localhost:9050/bigquery/v2");
        assert_eq!(settings.warehouse.timeout_secs, Some(5));
        assert!(settings.behavior.fail_on_insert_error);
        assert_eq!(settings.warehouse.backend, Backend::Bigquery);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config file format"));
    }
}
