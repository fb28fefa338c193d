use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Google Cloud configuration
    pub google: GoogleConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Base URL of the Video Intelligence REST API
    pub endpoint: String,

    /// Bucket used to resolve video paths given without a `gs://` prefix
    pub bucket_name: String,

    /// Where the bearer token for API calls comes from
    pub credentials: CredentialsConfig,

    /// Speech transcription job settings
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Pre-issued OAuth2 access token
    pub access_token: Option<String>,

    /// Service-account key file (JSON)
    pub service_account_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// BCP-47 language code sent with every request
    pub language_code: String,

    /// Ask the service to punctuate the transcript
    pub enable_automatic_punctuation: bool,

    /// Upper bound for waiting on one annotate operation
    pub operation_timeout_secs: u64,

    /// Delay before the first status check
    pub initial_poll_interval_secs: u64,

    /// Poll delay cap
    pub max_poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Requests allowed to wait on the service at the same time
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum width of a transcript line
    pub max_chars_per_line: usize,

    /// Default output format for the `transcribe` command
    pub default_output_format: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://videointelligence.googleapis.com".to_string(),
            bucket_name: "myvideotranscriber.firebasestorage.app".to_string(),
            credentials: CredentialsConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            enable_automatic_punctuation: true,
            operation_timeout_secs: 600,
            initial_poll_interval_secs: 5,
            max_poll_interval_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_concurrent_requests: 10,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_chars_per_line: 80,
            default_output_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file (if any), then apply environment overrides
    pub async fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let config_path = Self::config_path()?;
                if config_path.exists() {
                    Self::from_file(&config_path)?
                } else {
                    tracing::debug!("No config file at {}, using defaults", config_path.display());
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-transcriber").join("config.yaml"))
    }

    /// Apply deployment environment variables on top of file values
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup("BUCKET_NAME").filter(|v| !v.is_empty()) {
            self.google.bucket_name = bucket;
        }
        if let Some(endpoint) = lookup("VIDEO_INTELLIGENCE_ENDPOINT").filter(|v| !v.is_empty()) {
            self.google.endpoint = endpoint;
        }
        if let Some(token) = lookup("GOOGLE_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.google.credentials.access_token = Some(token);
        }
        if let Some(path) = lookup("GOOGLE_APPLICATION_CREDENTIALS").filter(|v| !v.is_empty()) {
            self.google.credentials.service_account_path = Some(PathBuf::from(path));
        }
        if let Some(max) = lookup("MAX_INSTANCES") {
            self.server.max_concurrent_requests = max
                .trim()
                .parse()
                .with_context(|| format!("MAX_INSTANCES must be a positive integer, got {:?}", max))?;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got {:?}", port))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.google.endpoint)
            .with_context(|| format!("Invalid Video Intelligence endpoint: {}", self.google.endpoint))?;

        if self.app.max_chars_per_line == 0 {
            anyhow::bail!("max_chars_per_line must be greater than zero");
        }

        if self.server.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than zero");
        }

        let transcription = &self.google.transcription;
        if transcription.operation_timeout_secs == 0 {
            anyhow::bail!("operation_timeout_secs must be greater than zero");
        }
        if transcription.max_poll_interval_secs < transcription.initial_poll_interval_secs {
            anyhow::bail!("max_poll_interval_secs must not be smaller than initial_poll_interval_secs");
        }
        if transcription.language_code.trim().is_empty() {
            anyhow::bail!("language_code must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Endpoint: {}", self.google.endpoint);
        println!("  Bucket: {}", self.google.bucket_name);
        println!("  Language: {}", self.google.transcription.language_code);
        println!("  Punctuation: {}", self.google.transcription.enable_automatic_punctuation);
        println!("  Operation Timeout: {}s", self.google.transcription.operation_timeout_secs);
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Max Concurrent Requests: {}", self.server.max_concurrent_requests);
        println!("  Max Chars Per Line: {}", self.app.max_chars_per_line);
        let credentials = if self.google.credentials.access_token.is_some() {
            "access token".to_string()
        } else if let Some(path) = &self.google.credentials.service_account_path {
            format!("service account ({})", path.display())
        } else {
            "metadata server".to_string()
        };
        println!("  Credentials: {}", credentials);
    }

    /// Deadline for one annotate operation
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.google.transcription.operation_timeout_secs)
    }

    /// Socket address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.app.max_chars_per_line, 80);
        assert_eq!(config.server.max_concurrent_requests, 10);
        assert_eq!(config.google.transcription.operation_timeout_secs, 600);
        assert_eq!(config.google.transcription.language_code, "en-US");
        assert!(config.google.transcription.enable_automatic_punctuation);
        assert_eq!(config.operation_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup_from(&[
                ("BUCKET_NAME", "my-bucket"),
                ("MAX_INSTANCES", "4"),
                ("PORT", "9000"),
                ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
            ]))
            .unwrap();

        assert_eq!(config.google.bucket_name, "my-bucket");
        assert_eq!(config.server.max_concurrent_requests, 4);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.google.credentials.access_token.as_deref(), Some("ya29.token"));
    }

    #[test]
    fn test_invalid_max_instances() {
        let mut config = Config::default();
        let result = config.apply_overrides(lookup_from(&[("MAX_INSTANCES", "ten")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_bucket_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[("BUCKET_NAME", "")])).unwrap();
        assert_eq!(config.google.bucket_name, "myvideotranscriber.firebasestorage.app");
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let mut config = Config::default();
        config.app.max_chars_per_line = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.google.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_keeps_language_as_configured() {
        let mut config = Config::default();
        config.google.transcription.language_code = "pt".to_string();
        config.validate().unwrap();
        assert_eq!(config.google.transcription.language_code, "pt");

        config.google.transcription.language_code = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, "app:\n  max_chars_per_line: 42\nserver:\n  port: 3000\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.app.max_chars_per_line, 42);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_concurrent_requests, 10);
        assert_eq!(config.google.transcription.operation_timeout_secs, 600);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.google.bucket_name = "saved-bucket".to_string();
        let written = config.save(Some(&path)).await.unwrap();
        assert_eq!(written, path);

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.google.bucket_name, "saved-bucket");
    }
}
