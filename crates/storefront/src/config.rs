//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Hosted backend endpoint (e.g., <https://xyz.supabase.co>)
//! - `SUPABASE_ANON_KEY` - Public API key sent with every request
//!
//! ## Optional
//! - `STOREFRONT_IMAGE_BUCKET` - Storage bucket for product images (default: product-images)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `BOOTSTRAP_ADMIN_ENABLED` - Allow the bootstrap administrator procedure (default: false)
//! - `BOOTSTRAP_ADMIN_IDENTIFIER` - Reserved sign-in identifier (default: admin)
//! - `BOOTSTRAP_ADMIN_SECRET` - Reserved sign-in secret (default: admin123)
//! - `BOOTSTRAP_ADMIN_EMAIL` - Email of the bootstrap account (default: admin@apartmart.com)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_IMAGE_BUCKET: &str = "product-images";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "30";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Hosted backend connection settings
    pub backend: BackendConfig,
    /// Storage bucket for product images
    pub image_bucket: String,
    /// Bootstrap administrator policy
    pub bootstrap: BootstrapPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Hosted backend connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Service endpoint
    pub url: Url,
    /// Public API key
    pub anon_key: SecretString,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Whether, and with which reserved credential, the bootstrap administrator
/// procedure may run.
///
/// Creating a privileged account from a fixed credential is a development
/// convenience, so it is off unless explicitly enabled.
#[derive(Clone)]
pub struct BootstrapPolicy {
    pub enabled: bool,
    /// Identifier typed into the sign-in form
    pub identifier: String,
    /// Secret typed into the sign-in form, also used as the account password
    pub secret: SecretString,
    /// Email the bootstrap identity is registered under
    pub email: String,
}

impl BootstrapPolicy {
    /// Whether a sign-in attempt uses the reserved credential.
    #[must_use]
    pub fn matches(&self, identifier: &str, secret: &str) -> bool {
        identifier == self.identifier && secret == self.secret.expose_secret()
    }
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            identifier: "admin".to_string(),
            secret: SecretString::from("admin123"),
            email: "admin@apartmart.com".to_string(),
        }
    }
}

impl std::fmt::Debug for BootstrapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapPolicy")
            .field("enabled", &self.enabled)
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("email", &self.email)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = BackendConfig::from_lookup(&env)?;
        let image_bucket = get_env_or_default(&env, "STOREFRONT_IMAGE_BUCKET", DEFAULT_IMAGE_BUCKET);
        let bootstrap = BootstrapPolicy::from_lookup(&env)?;
        let sentry_dsn = get_optional_env(&env, "SENTRY_DSN");

        Ok(Self {
            backend,
            image_bucket,
            bootstrap,
            sentry_dsn,
        })
    }
}

impl BackendConfig {
    fn from_lookup(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_required_env(env, "SUPABASE_URL")?;
        let url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidEnvVar(
                "SUPABASE_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let anon_key = get_required_secret(env, "SUPABASE_ANON_KEY")?;
        if anon_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SUPABASE_ANON_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let timeout_secs = get_env_or_default(
            env,
            "STOREFRONT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar(
                "STOREFRONT_REQUEST_TIMEOUT_SECS".to_string(),
                e.to_string(),
            )
        })?;

        Ok(Self {
            url,
            anon_key,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl BootstrapPolicy {
    fn from_lookup(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let enabled = match get_optional_env(env, "BOOTSTRAP_ADMIN_ENABLED") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "BOOTSTRAP_ADMIN_ENABLED".to_string(),
                    format!("expected true/false, got '{value}'"),
                )
            })?,
            None => defaults.enabled,
        };

        Ok(Self {
            enabled,
            identifier: get_env_or_default(env, "BOOTSTRAP_ADMIN_IDENTIFIER", &defaults.identifier),
            secret: get_optional_env(env, "BOOTSTRAP_ADMIN_SECRET")
                .map_or(defaults.secret, SecretString::from),
            email: get_env_or_default(env, "BOOTSTRAP_ADMIN_EMAIL", &defaults.email),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = get_required_env(env, key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(env, key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
