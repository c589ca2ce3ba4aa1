// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub email_provider: EmailProviderConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    pub worker: WorkerConfig,
    pub rate_limit: RateLimitConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String {
    "tenantry_token".to_string()
}

/// Nylas v3 connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailProviderConfig {
    pub api_url: String,
    pub api_key: String,
    pub webhook_secret: String,
    pub page_size: u32,
    pub max_pages_per_sync: u32,
    pub timeout_seconds: u64,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Domains whose mail always scores as important
    #[serde(default)]
    pub vip_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub sync_interval_seconds: u64,
    pub reminder_interval_seconds: u64,
    pub lock_ttl_seconds: u64,
    pub reminder_batch_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub webhook_max_requests: u32,
    pub webhook_window_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("screening.vip_domains"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if self.auth.jwt_secret.is_empty() {
            return Err("JWT secret cannot be empty".to_string());
        }

        if self.email_provider.api_url.is_empty() {
            return Err("Email provider api_url cannot be empty".to_string());
        }
        if self.email_provider.page_size == 0 {
            return Err("Email provider page_size must be greater than 0".to_string());
        }

        if self.worker.sync_interval_seconds == 0 {
            return Err("Worker sync_interval_seconds must be greater than 0".to_string());
        }
        if self.worker.reminder_interval_seconds == 0 {
            return Err("Worker reminder_interval_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/tenantry".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                jwt_expiration_hours: 24,
                cookie_name: default_cookie_name(),
            },
            email_provider: EmailProviderConfig {
                api_url: "https://api.us.nylas.com".to_string(),
                api_key: String::new(),
                webhook_secret: String::new(),
                page_size: 50,
                max_pages_per_sync: 10,
                timeout_seconds: 30,
            },
            llm: LlmConfig {
                api_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: 512,
                timeout_seconds: 60,
            },
            screening: ScreeningConfig::default(),
            worker: WorkerConfig {
                sync_interval_seconds: 300,
                reminder_interval_seconds: 60,
                lock_ttl_seconds: 600,
                reminder_batch_size: 100,
            },
            rate_limit: RateLimitConfig {
                webhook_max_requests: 120,
                webhook_window_seconds: 60,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_port() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_page_size() {
        let mut settings = Settings::default();
        settings.email_provider.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_directory_reads_default_toml() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = toml_for(&Settings::default()).replace("port = 8080", "port = 9001");
        std::fs::write(dir.path().join("default.toml"), defaults).unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.auth.cookie_name, "tenantry_token");
        assert!(settings.screening.vip_domains.is_empty());
    }

    fn toml_for(settings: &Settings) -> String {
        format!(
            r#"[server]
host = "{host}"
port = {port}

[database]
url = "{db}"
max_connections = 10
min_connections = 2
connect_timeout_seconds = 30

[redis]
url = "{redis}"

[auth]
jwt_secret = "secret"
jwt_expiration_hours = 24

[email_provider]
api_url = "https://api.us.nylas.com"
api_key = ""
webhook_secret = ""
page_size = 50
max_pages_per_sync = 10
timeout_seconds = 30

[llm]
api_url = "https://api.openai.com/v1"
api_key = ""
model = "gpt-4o-mini"
max_tokens = 512
timeout_seconds = 60

[worker]
sync_interval_seconds = 300
reminder_interval_seconds = 60
lock_ttl_seconds = 600
reminder_batch_size = 100

[rate_limit]
webhook_max_requests = 120
webhook_window_seconds = 60

[observability]
log_level = "info"
metrics_port = 9090
"#,
            host = settings.server.host,
            port = settings.server.port,
            db = settings.database.url,
            redis = settings.redis.url,
        )
    }

    #[test]
    fn test_validation_catches_zero_sync_interval() {
        let mut settings = Settings::default();
        settings.worker.sync_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }
}
