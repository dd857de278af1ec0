use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bank: BankConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub proxy: ProxyConfig,
}

/// Remote question-bank / scoring service configuration
#[derive(Debug, Clone)]
pub struct BankConfig {
    pub base_url: String,
}

/// History ledger storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub ledger_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Caching proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Partition holding the application shell.
    pub shell_cache: String,
    /// Partition holding runtime-cached assets and API responses.
    pub runtime_cache: String,
    /// Paths seeded into the shell partition at install time.
    pub shell_manifest: Vec<String>,
    /// Activate immediately after install instead of waiting.
    pub skip_waiting: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let bank = BankConfig {
            base_url: env::var("HIGHIQ_BANK_URL").map_err(|_| AppError::Config {
                message: "HIGHIQ_BANK_URL is required".to_string(),
            })?,
        };

        let storage = StorageConfig {
            ledger_path: PathBuf::from(
                env::var("HIGHIQ_LEDGER_PATH")
                    .unwrap_or_else(|_| "./data/test_history.json".to_string()),
            ),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        };

        let proxy = ProxyConfig {
            shell_cache: env::var("HIGHIQ_SHELL_CACHE")
                .unwrap_or_else(|_| ProxyConfig::DEFAULT_SHELL_CACHE.to_string()),
            runtime_cache: env::var("HIGHIQ_RUNTIME_CACHE")
                .unwrap_or_else(|_| ProxyConfig::DEFAULT_RUNTIME_CACHE.to_string()),
            shell_manifest: ProxyConfig::default_shell_manifest(),
            skip_waiting: env::var("HIGHIQ_SKIP_WAITING")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        };

        Ok(Config {
            bank,
            storage,
            logging,
            request,
            proxy,
        })
    }
}

impl ProxyConfig {
    /// Current shell cache partition name.
    pub const DEFAULT_SHELL_CACHE: &'static str = "high-iq-shell-v1";
    /// Current runtime cache partition name.
    pub const DEFAULT_RUNTIME_CACHE: &'static str = "high-iq-v1";

    /// App shell assets cached eagerly at install so the application
    /// boots with no network at all.
    pub fn default_shell_manifest() -> Vec<String> {
        [
            "/",
            "/index.html",
            "/manifest.webmanifest",
            "/assets/generated/high-iq-app-icon.dim_192x192.png",
            "/assets/generated/high-iq-app-icon.dim_512x512.png",
            "/assets/generated/high-iq-logo.dim_512x512.png",
            "/assets/generated/high-iq-hero.dim_1600x900.png",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            shell_cache: Self::DEFAULT_SHELL_CACHE.to_string(),
            runtime_cache: Self::DEFAULT_RUNTIME_CACHE.to_string(),
            shell_manifest: Self::default_shell_manifest(),
            skip_waiting: false,
        }
    }
}
