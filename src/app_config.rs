// Centralized configuration management
// Load ALL env vars ONCE at startup; fail fast on missing secrets

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,

    // Features
    pub run_migrations_on_boot: bool,
    pub cors_allowed_origins: Vec<String>,

    // Nested configs
    pub jwt: JwtSettings,
    pub super_admin: SuperAdminSettings,
    pub stripe: StripeSettings,
    pub push: PushSettings,
    pub email: EmailSettings,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    pub expiry_seconds: u64,
    pub audience: String,
    pub issuer: String,
}

/// Synthetic super-admin credentials, checked before any user-table lookup.
/// The password is held as an Argon2 PHC hash, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperAdminSettings {
    pub email: String,
    pub password_hash: String,
}

/// Stripe API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub portal_configuration_id: Option<String>,
    pub checkout_redirect_url: String,
    pub api_base: String,
}

/// FCM HTTP v1 push delivery configuration (service-account credentials)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    pub fcm_project_id: String,
    pub service_account_email: String,
    pub service_account_private_key: String,
    pub android_channel_id: String,
}

/// Email delivery configuration (Resend-style HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub api_key: String,
    pub api_url: String,
    pub from_email: String,
    pub from_name: String,
    pub admin_email: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let rust_log = get_or_default("RUST_LOG", "info");

        let database_url = get_required("DATABASE_URL")?;
        let database_max_connections = parse_or_default("DATABASE_MAX_CONNECTIONS", "10")?;
        let database_min_connections = parse_or_default("DATABASE_MIN_CONNECTIONS", "0")?;
        let database_connect_timeout = parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?;
        let database_idle_timeout = parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?;
        let database_max_lifetime = parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?;

        let run_migrations_on_boot = parse_bool_or_default("RUN_MIGRATIONS_ON_BOOT", "true");

        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let jwt_secret = get_required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let jwt = JwtSettings {
            secret: jwt_secret,
            expiry_seconds: parse_u64_or_default("JWT_EXPIRY", "604800")?,
            audience: get_or_default("JWT_AUDIENCE", "niko-app"),
            issuer: get_or_default("JWT_ISSUER", "niko-backend"),
        };

        let super_admin = SuperAdminSettings {
            email: get_required("SUPERADMIN_EMAIL")?,
            password_hash: get_required("SUPERADMIN_PASSWORD_HASH")?,
        };

        let stripe = StripeSettings {
            secret_key: get_required("STRIPE_SECRET_KEY")?,
            webhook_secret: get_required("STRIPE_WEBHOOK_SECRET")?,
            portal_configuration_id: env::var("STRIPE_PORTAL_CONFIGURATION_ID").ok(),
            checkout_redirect_url: get_or_default(
                "CHECKOUT_REDIRECT_URL",
                "http://localhost:3000/payment_success",
            ),
            api_base: get_or_default("STRIPE_API_BASE", "https://api.stripe.com/v1"),
        };

        let push = PushSettings {
            fcm_project_id: get_required("FCM_PROJECT_ID")?,
            service_account_email: get_required("FCM_SERVICE_ACCOUNT_EMAIL")?,
            service_account_private_key: get_required("FCM_SERVICE_ACCOUNT_PRIVATE_KEY")?,
            android_channel_id: get_or_default("FCM_ANDROID_CHANNEL_ID", "niko"),
        };

        let email = EmailSettings {
            api_key: get_required("EMAIL_API_KEY")?,
            api_url: get_or_default("EMAIL_API_URL", "https://api.resend.com/emails"),
            from_email: get_or_default("EMAIL_FROM_ADDRESS", "noreply@example.com"),
            from_name: get_or_default("EMAIL_FROM_NAME", "Niko Support"),
            admin_email: get_or_default("ADMIN_EMAIL", "support@example.com"),
        };

        Ok(Self {
            bind_address,
            port,
            environment,
            rust_log,
            database_url,
            database_max_connections,
            database_min_connections,
            database_connect_timeout,
            database_idle_timeout,
            database_max_lifetime,
            run_migrations_on_boot,
            cors_allowed_origins,
            jwt,
            super_admin,
            stripe,
            push,
            email,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Get the global configuration instance
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_string() {
        assert_eq!(
            Environment::from("development".to_string()),
            Environment::Development
        );
        assert_eq!(
            Environment::from("prod".to_string()),
            Environment::Production
        );
        assert_eq!(Environment::from("test".to_string()), Environment::Test);
        assert_eq!(
            Environment::from("staging".to_string()),
            Environment::Staging
        );
    }
}
