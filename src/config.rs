use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;

/// Configuration file structure for pipelens.
///
/// Lets operators keep the organization, project and tuning knobs in a file
/// instead of passing them on every invocation. Command-line flags and
/// environment variables override whatever is loaded here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub devops: DevOpsConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DevOpsConfig {
    /// Personal access token
    pub token: Option<String>,

    /// Organization name (the first path segment after the service root)
    pub organization: Option<String>,

    /// Project name or id
    pub project: Option<String>,

    /// Service root
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// Base delay between poll cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before the first poll after startup
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    /// Upper bound on the backoff multiplier applied after failed cycles
    #[serde(default = "default_max_backoff_multiplier")]
    pub max_backoff_multiplier: u32,

    /// Per-pipeline fetches allowed in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DashboardConfig {
    /// Rows per progressive batch event
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Which YAML settings parser to use
    #[serde(default)]
    pub parser: ParserKind,

    /// Builds per pipeline considered by the health view
    #[serde(default = "default_health_builds")]
    pub health_builds: usize,

    /// Runs listed by the run-history view
    #[serde(default = "default_runs")]
    pub runs: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    #[default]
    LineScan,
    Structural,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Default for DevOpsConfig {
    fn default() -> Self {
        Self {
            token: None,
            organization: None,
            project: None,
            base_url: default_base_url(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            warmup_secs: default_warmup_secs(),
            max_backoff_multiplier: default_max_backoff_multiplier(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parser: ParserKind::default(),
            health_builds: default_health_builds(),
            runs: default_runs(),
        }
    }
}

fn default_base_url() -> String {
    "https://dev.azure.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_warmup_secs() -> u64 {
    10
}

fn default_max_backoff_multiplier() -> u32 {
    12
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_batch_size() -> usize {
    3
}

fn default_health_builds() -> usize {
    10
}

fn default_runs() -> usize {
    5
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipelens.toml, ./pipelens.json, ./pipelens.yaml, ./pipelens.yml
    /// 3. `<config dir>/pipelens/pipelens.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }

        Ok(Self::default())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = ["pipelens.toml", "pipelens.json", "pipelens.yaml", "pipelens.yml"]
            .iter()
            .map(PathBuf::from)
            .collect();

        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("pipelens").join("pipelens.toml"));
        }

        candidates
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

/// Credentials and scope needed to talk to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub token: Token,
    pub organization: String,
    pub project: String,
}

impl ConnectionSettings {
    /// Returns `None` unless all three values are present and non-blank.
    pub fn from_parts(
        token: Option<&str>,
        organization: Option<&str>,
        project: Option<&str>,
    ) -> Option<Self> {
        fn non_blank(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        Some(Self {
            token: Token::from(non_blank(token)?),
            organization: non_blank(organization)?.to_string(),
            project: non_blank(project)?.to_string(),
        })
    }
}

/// Source of connection settings, consulted at the start of every poll.
///
/// `None` means "not configured yet", which callers treat as a quiet state
/// rather than an error.
pub trait ConnectionProvider: Send + Sync {
    fn connection(&self) -> Option<ConnectionSettings>;
}

/// Settings fixed at startup (config file merged with CLI flags).
#[derive(Debug, Clone, Default)]
pub struct StaticConnection(Option<ConnectionSettings>);

impl StaticConnection {
    pub fn new(settings: Option<ConnectionSettings>) -> Self {
        Self(settings)
    }
}

impl From<&DevOpsConfig> for StaticConnection {
    fn from(config: &DevOpsConfig) -> Self {
        Self(ConnectionSettings::from_parts(
            config.token.as_deref(),
            config.organization.as_deref(),
            config.project.as_deref(),
        ))
    }
}

impl ConnectionProvider for StaticConnection {
    fn connection(&self) -> Option<ConnectionSettings> {
        self.0.clone()
    }
}

/// Reads `AZURE_DEVOPS_PAT`, `AZURE_DEVOPS_ORG` and `AZURE_DEVOPS_PROJECT`
/// on every call, so a running monitor picks up settings supplied later.
#[derive(Debug, Clone, Default)]
pub struct EnvConnection;

impl ConnectionProvider for EnvConnection {
    fn connection(&self) -> Option<ConnectionSettings> {
        let token = std::env::var("AZURE_DEVOPS_PAT").ok();
        let org = std::env::var("AZURE_DEVOPS_ORG").ok();
        let project = std::env::var("AZURE_DEVOPS_PROJECT").ok();
        ConnectionSettings::from_parts(token.as_deref(), org.as_deref(), project.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.devops.base_url, "https://dev.azure.com");
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor.warmup(), Duration::from_secs(10));
        assert_eq!(config.monitor.max_backoff_multiplier, 12);
        assert_eq!(config.monitor.max_concurrent_requests, 5);
        assert_eq!(config.dashboard.batch_size, 3);
        assert_eq!(config.dashboard.parser, ParserKind::LineScan);
        assert_eq!(config.output.format, OutputFormat::Table);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[devops]
token = "pat-test-token"
organization = "contoso"
project = "web"

[monitor]
poll-interval-secs = 15
warmup-secs = 0

[dashboard]
parser = "structural"

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.devops.token, Some("pat-test-token".to_string()));
        assert_eq!(config.devops.organization.as_deref(), Some("contoso"));
        assert_eq!(config.devops.base_url, "https://dev.azure.com");
        assert_eq!(config.monitor.poll_interval_secs, 15);
        assert_eq!(config.monitor.warmup_secs, 0);
        assert_eq!(config.monitor.max_backoff_multiplier, 12);
        assert_eq!(config.dashboard.parser, ParserKind::Structural);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "devops": {
    "organization": "fabrikam",
    "base-url": "https://devops.fabrikam.local"
  },
  "dashboard": {
    "batch-size": 5
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.devops.base_url, "https://devops.fabrikam.local");
        assert_eq!(config.dashboard.batch_size, 5);
        assert!(config.devops.token.is_none());
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        write!(temp_file, "monitor:\n  max-concurrent-requests: 2\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.monitor.max_concurrent_requests, 2);
        assert_eq!(config.monitor.poll_interval_secs, 5);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let result = Config::load(Some(Path::new("definitely-missing-pipelens.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_static_connection_requires_all_values() {
        let mut devops = DevOpsConfig {
            token: Some("pat".to_string()),
            organization: Some("contoso".to_string()),
            project: Some("  ".to_string()),
            ..DevOpsConfig::default()
        };
        assert!(StaticConnection::from(&devops).connection().is_none());

        devops.project = Some("web".to_string());
        let settings = StaticConnection::from(&devops).connection().unwrap();
        assert_eq!(settings.organization, "contoso");
        assert_eq!(settings.project, "web");
        assert_eq!(settings.token.as_str(), "pat");
    }

    #[test]
    fn test_connection_settings_trim_values() {
        let settings =
            ConnectionSettings::from_parts(Some(" pat "), Some(" contoso"), Some("web ")).unwrap();
        assert_eq!(settings.token.as_str(), "pat");
        assert_eq!(settings.organization, "contoso");
        assert_eq!(settings.project, "web");

        assert!(ConnectionSettings::from_parts(Some("pat"), None, Some("web")).is_none());
        assert!(ConnectionSettings::from_parts(Some(""), Some("contoso"), Some("web")).is_none());
    }
}
