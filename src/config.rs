use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::{DEFAULT_INSIGHTS_LIMIT, MAX_INSIGHTS_LIMIT};

const CONFIG_STEM: &str = "travis-lens";

/// Configuration file structure for travis-lens.
///
/// Every section and field is optional; missing values fall back to the
/// defaults below. Command-line flags override whatever the file says.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Travis API access
    #[serde(default)]
    pub travis: TravisConfig,

    /// Analysis parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Server behaviour
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the values came from and what was adjusted, logged once the
    /// logger is up
    #[serde(skip)]
    origin: LoadNotes,
}

#[derive(Debug, Clone, Default)]
struct LoadNotes {
    source: Option<PathBuf>,
    adjustments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TravisConfig {
    /// Travis API token
    pub token: Option<String>,

    /// API base URL (travis-ci.com, or an Enterprise installation)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Web UI base URL used for links
    #[serde(default = "default_web_url")]
    pub web_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Builds analyzed by the insights report when no limit is given
    #[serde(default = "default_insights_limit")]
    pub insights_limit: usize,

    /// Entries returned by the listing tools when no limit is given
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Default log filter; RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TravisConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            web_url: default_web_url(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            insights_limit: default_insights_limit(),
            list_limit: default_list_limit(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.travis-ci.com".to_string()
}

fn default_web_url() -> String {
    "https://app.travis-ci.com".to_string()
}

fn default_insights_limit() -> usize {
    DEFAULT_INSIGHTS_LIMIT
}

fn default_list_limit() -> usize {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./travis-lens.toml
    /// 3. ./travis-lens.json
    /// 4. ./travis-lens.yaml
    /// 5. ./travis-lens.yml
    /// 6. `<config dir>/travis-lens/config.toml`
    ///
    /// Returns default configuration if no file is found. A specified path
    /// that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        match Self::find(Path::new("."), dirs::config_dir().as_deref()) {
            Some(found) => Self::load_from_path(&found),
            None => Ok(Self::default()),
        }
    }

    fn find(working_dir: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
        let local = ["toml", "json", "yaml", "yml"]
            .iter()
            .map(|ext| working_dir.join(format!("{CONFIG_STEM}.{ext}")));
        let global = config_dir.map(|dir| dir.join(CONFIG_STEM).join("config.toml"));

        local.chain(global).find(|candidate| candidate.exists())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let mut config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config.origin.source = Some(path.to_path_buf());
        Ok(config.normalized())
    }

    /// Keeps limits inside what the API and the analyzers accept.
    fn normalized(mut self) -> Self {
        if self.analysis.insights_limit > MAX_INSIGHTS_LIMIT {
            self.origin.adjustments.push(format!(
                "insights-limit {} exceeds the maximum, using {MAX_INSIGHTS_LIMIT}",
                self.analysis.insights_limit
            ));
            self.analysis.insights_limit = MAX_INSIGHTS_LIMIT;
        }
        self.analysis.insights_limit = self.analysis.insights_limit.max(1);
        self.analysis.list_limit = self.analysis.list_limit.max(1);
        self
    }

    /// Reports where the configuration came from and any adjusted values.
    ///
    /// Loading happens before logging is set up, so this runs afterwards.
    pub fn log_origin(&self) {
        match &self.origin.source {
            Some(path) => debug!("Loaded configuration from {}", path.display()),
            None => debug!("No configuration file found, using defaults"),
        }
        for adjustment in &self.origin.adjustments {
            warn!("{adjustment}");
        }
    }

    /// Applies command-line overrides on top of the file values.
    pub fn with_overrides(mut self, token: Option<String>, api_url: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.travis.token = Some(token);
        }
        if let Some(api_url) = api_url {
            self.travis.api_url = api_url;
        }
        self
    }
}
