//! Provider configuration
//!
//! Values come from the provider block, fall back to `RANCHER_*` environment
//! variables, and finally to the Rancher CLI `cli.json` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rancher_client::{ClientError, HttpClient};
use rancher_core::provider::ProviderError;
use rancher_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde::Deserialize;
use url::Url;

pub const ENV_URL: &str = "RANCHER_URL";
pub const ENV_ACCESS_KEY: &str = "RANCHER_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "RANCHER_SECRET_KEY";
pub const ENV_CLIENT_CONFIG: &str = "RANCHER_CLIENT_CONFIG";

/// Help text of the provider block attributes
pub static DESCRIPTIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (
            "access_key",
            "API Key used to authenticate with the rancher server",
        ),
        (
            "secret_key",
            "API secret used to authenticate with the rancher server",
        ),
        (
            "api_url",
            "The URL to the rancher API, must include version uri (ie. v1 or v2-beta)",
        ),
        ("config", "Path to the Rancher client cli.json config file"),
        (
            "skip_config_validation",
            "Skip the configuration parameters validation.",
        ),
    ])
});

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No api_url provided")]
    NoApiUrl,

    #[error("Error loading the Rancher CLI config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing the Rancher CLI config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid api_url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<ConfigError> for ProviderError {
    fn from(err: ConfigError) -> Self {
        ProviderError::configuration(err.to_string()).with_cause(err)
    }
}

/// Contents of the Rancher CLI `cli.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliConfig {
    pub access_key: String,
    pub secret_key: String,
    pub url: String,
    pub environment: String,
}

impl CliConfig {
    /// Load the file; a missing file yields `None`
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Rancher CLI config {} not found", path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Declared provider block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub config: Option<PathBuf>,
    pub skip_config_validation: bool,
}

/// Settings the client is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub access_key: String,
    pub secret_key: String,
    /// Default environment named in `cli.json`, if any
    pub environment: Option<String>,
}

impl ProviderConfig {
    /// Defaults taken from the `RANCHER_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).unwrap_or_default();
        Self {
            api_url: var(ENV_URL),
            access_key: var(ENV_ACCESS_KEY),
            secret_key: var(ENV_SECRET_KEY),
            config: lookup(ENV_CLIENT_CONFIG)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            skip_config_validation: false,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let mut resolved = ResolvedConfig {
            api_url: strip_version(&self.api_url).to_string(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            environment: None,
        };
        if self.skip_config_validation {
            return Ok(resolved);
        }

        let file = match &self.config {
            Some(path) => CliConfig::load(path)?,
            None => None,
        };
        if let Some(file) = file {
            if resolved.api_url.is_empty() && !file.url.is_empty() {
                resolved.api_url = server_root(&file.url)?;
            }
            if resolved.access_key.is_empty() {
                resolved.access_key = file.access_key;
            }
            if resolved.secret_key.is_empty() {
                resolved.secret_key = file.secret_key;
            }
            resolved.environment = Some(file.environment).filter(|e| !e.is_empty());
        }

        if resolved.api_url.is_empty() {
            return Err(ConfigError::NoApiUrl);
        }
        Ok(resolved)
    }
}

impl ResolvedConfig {
    pub fn client(&self) -> Result<HttpClient, ConfigError> {
        log::info!("Connecting to Rancher at {}", self.api_url);
        Ok(HttpClient::new(
            &self.api_url,
            self.access_key.clone(),
            self.secret_key.clone(),
        )?)
    }
}

/// `scheme://host[:port]` of a URL
fn server_root(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: "no host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// The client appends the API version itself
fn strip_version(api_url: &str) -> &str {
    let trimmed = api_url.trim_end_matches('/');
    ["/v2-beta", "/v1"]
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
}

/// Schema of the provider block
pub fn provider_schema() -> ResourceSchema {
    let described = |name: &str, attr_type: AttributeType| {
        let schema = AttributeSchema::new(name, attr_type);
        match DESCRIPTIONS.get(name) {
            Some(desc) => schema.with_description(*desc),
            None => schema,
        }
    };
    ResourceSchema::new("rancher")
        .attribute(described("api_url", AttributeType::String))
        .attribute(described("access_key", AttributeType::String))
        .attribute(described("secret_key", AttributeType::String).sensitive())
        .attribute(described("config", AttributeType::String))
        .attribute(
            described("skip_config_validation", AttributeType::Bool)
                .with_default(rancher_core::resource::Value::Bool(false)),
        )
}
