use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Public origin used for links; routes drop the prefix when set
    pub domain: Option<String>,
    pub prefix: String,
    pub version: String,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub jwt_remember_ttl_minutes: i64,
    /// Lifetime of the registration hand-off link
    pub register_link_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("API_DOMAIN") {
            let v = v.trim().trim_end_matches('/').to_string();
            self.api.domain = (!v.is_empty()).then_some(v);
        }
        if let Ok(v) = env::var("API_PREFIX") {
            self.api.prefix = v.trim().trim_matches('/').to_string();
        }
        if let Ok(v) = env::var("API_VERSION") {
            self.api.version = v.trim().trim_matches('/').to_string();
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_TTL_MINUTES") {
            self.security.jwt_ttl_minutes = v.parse().unwrap_or(self.security.jwt_ttl_minutes);
        }
        if let Ok(v) = env::var("JWT_REMEMBER_TTL_MINUTES") {
            self.security.jwt_remember_ttl_minutes = v.parse().unwrap_or(self.security.jwt_remember_ttl_minutes);
        }
        if let Ok(v) = env::var("REGISTER_LINK_MINUTES") {
            self.security.register_link_minutes = v.parse().unwrap_or(self.security.register_link_minutes);
        }

        if let Ok(v) = env::var("PORT") {
            self.port = v.parse().unwrap_or(self.port);
        }

        self.normalized()
    }

    /// Keep page sizes usable whatever the environment says
    fn normalized(mut self) -> Self {
        self.api.max_page_size = self.api.max_page_size.max(1);
        self.api.default_page_size = self.api.default_page_size.clamp(1, self.api.max_page_size);
        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                domain: None,
                prefix: "api".to_string(),
                version: "v1".to_string(),
                default_page_size: 100,
                max_page_size: 1000,
            },
            database: DatabaseConfig {
                url: "postgres://localhost:5432/jsonapi_users".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret-change-me".to_string(),
                jwt_ttl_minutes: 60,
                jwt_remember_ttl_minutes: 10080,
                register_link_minutes: 10,
            },
            port: 3000,
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.api.max_page_size = 500;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.jwt_secret = String::new();
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.api.max_page_size = 100;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.security.jwt_secret = String::new();
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
