//! Configuration module
//!
//! Settings are read from the environment (after loading an optional `.env`
//! file). Every value has a default so a bare `dropcode` binary starts with a
//! working configuration; [`Config::validate`] rejects combinations that are
//! unsafe or unusable.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::constants::{AUDIT_LOG_FILE_NAME, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_BLOCKED_EXTENSIONS};

const SERVER_PORT: u16 = 8080;
const DATA_DIR: &str = "./data";
const MAX_FILE_SIZE_MB: u64 = 10;
const MAX_REQUEST_BODY_MB: u64 = 100;
const TRUSTED_PROXY_COUNT: usize = 1;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Number of reverse proxies whose X-Forwarded-For entries are trusted
    pub trusted_proxy_count: usize,
    pub max_request_body_bytes: usize,
    /// `text` or `json`
    pub log_format: String,
}

/// Transfer store and upload policy settings
#[derive(Clone, Debug)]
pub struct TransferConfig {
    pub base: BaseConfig,
    pub data_dir: PathBuf,
    pub audit_log_path: PathBuf,
    pub max_file_size_bytes: u64,
    pub allowed_extensions: HashSet<String>,
    pub blocked_extensions: HashSet<String>,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config(pub Box<TransferConfig>);

impl Config {
    fn inner(&self) -> &TransferConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        TransferConfig::from_env().map(|c| Config(Box::new(c)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.inner().base.trusted_proxy_count
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.inner().base.max_request_body_bytes
    }

    pub fn log_format(&self) -> &str {
        &self.inner().base.log_format
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner().data_dir
    }

    pub fn audit_log_path(&self) -> &PathBuf {
        &self.inner().audit_log_path
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_extensions(&self) -> &HashSet<String> {
        &self.inner().allowed_extensions
    }

    pub fn blocked_extensions(&self) -> &HashSet<String> {
        &self.inner().blocked_extensions
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Parse a comma-separated extension list, lower-cased, leading dots dropped
pub fn parse_extension_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_extension_set(defaults: &[&str]) -> HashSet<String> {
    defaults.iter().map(|s| s.to_string()).collect()
}

impl TransferConfig {
    /// Defaults for everything except the storage root
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        TransferConfig {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                trusted_proxy_count: TRUSTED_PROXY_COUNT,
                max_request_body_bytes: (MAX_REQUEST_BODY_MB * 1024 * 1024) as usize,
                log_format: "text".to_string(),
            },
            audit_log_path: data_dir.join(AUDIT_LOG_FILE_NAME),
            data_dir,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: default_extension_set(DEFAULT_ALLOWED_EXTENSIONS),
            blocked_extensions: default_extension_set(DEFAULT_BLOCKED_EXTENSIONS),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(MAX_FILE_SIZE_MB);

        let max_request_body_mb = env::var("MAX_REQUEST_BODY_MB")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(MAX_REQUEST_BODY_MB);

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| DATA_DIR.to_string()));
        let audit_log_path = env::var("AUDIT_LOG_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(AUDIT_LOG_FILE_NAME));

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .ok()
            .map(|s| parse_extension_list(&s))
            .unwrap_or_else(|| default_extension_set(DEFAULT_ALLOWED_EXTENSIONS));

        let blocked_extensions = env::var("BLOCKED_EXTENSIONS")
            .ok()
            .map(|s| parse_extension_list(&s))
            .unwrap_or_else(|| default_extension_set(DEFAULT_BLOCKED_EXTENSIONS));

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(TRUSTED_PROXY_COUNT),
            max_request_body_bytes: (max_request_body_mb * 1024 * 1024) as usize,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        };

        let config = TransferConfig {
            base,
            data_dir,
            audit_log_path,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_extensions,
            blocked_extensions,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if is_production_env(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if (self.base.max_request_body_bytes as u64) < self.max_file_size_bytes {
            return Err(anyhow::anyhow!(
                "MAX_REQUEST_BODY_MB must be at least MAX_FILE_SIZE_MB"
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS must name at least one extension"
            ));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("DATA_DIR must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferConfig {
        TransferConfig::with_data_dir("./data")
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut config = sample();
        assert!(config.validate().is_ok());

        config.base.environment = "Production".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));

        config.base.cors_origins = vec!["https://share.example.com".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_place_audit_log_under_data_dir() {
        let config = sample();
        assert_eq!(config.audit_log_path, PathBuf::from("./data/system.log"));
        assert_eq!(config.max_file_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_body_limit_must_cover_file_limit() {
        let mut config = sample();
        config.base.max_request_body_bytes = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_extension_list_normalizes() {
        let set = parse_extension_list(" .PNG, jpg,,Txt ");
        assert_eq!(set.len(), 3);
        assert!(set.contains("png"));
        assert!(set.contains("jpg"));
        assert!(set.contains("txt"));
    }

    #[test]
    fn test_default_lists_overlap_on_js() {
        let config = sample();
        assert!(config.allowed_extensions.contains("js"));
        assert!(config.blocked_extensions.contains("js"));
    }
}
