//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the storefront REST service
//!
//! ## Optional
//! - `STOREFRONT_API_TOKEN` - Static bearer token for the service
//! - `STOREFRONT_PAGE_SIZE` - Products per listing page (default: 10)
//! - `STOREFRONT_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `STOREFRONT_CACHE_MAX_PRODUCTS` - Cap on cached products (default: unbounded)
//! - `STOREFRONT_CACHE_TTL_SECS` - Lifetime of a cached snapshot (default: session)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::cache::CachePolicy;

const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront data layer configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST service; endpoint paths are joined under it
    pub api_url: Url,
    /// Static bearer token, when the app does not supply a session
    pub api_token: Option<SecretString>,
    /// Products requested per listing page
    pub page_size: u32,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Eviction policy for the catalog cache
    pub cache: CachePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .field("http_timeout", &self.http_timeout)
            .field("cache", &self.cache)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Configuration for `api_url` with every other setting at its default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cache: CachePolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let api_url = env.required("STOREFRONT_API_URL")?;
        let api_url = Url::parse(&api_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_API_URL".to_string(), e.to_string())
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_API_URL".to_string(),
                format!("unsupported scheme '{}'", api_url.scheme()),
            ));
        }

        let api_token = match env.optional("STOREFRONT_API_TOKEN") {
            Some(token) => {
                validate_not_placeholder(&token, "STOREFRONT_API_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        let page_size = env
            .parsed::<u32>("STOREFRONT_PAGE_SIZE")?
            .unwrap_or(DEFAULT_PAGE_SIZE);
        at_least_one(page_size, "STOREFRONT_PAGE_SIZE")?;

        let timeout_secs = env
            .parsed::<u64>("STOREFRONT_HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        at_least_one(timeout_secs, "STOREFRONT_HTTP_TIMEOUT_SECS")?;

        let max_products = env.parsed::<u64>("STOREFRONT_CACHE_MAX_PRODUCTS")?;
        if let Some(max) = max_products {
            at_least_one(max, "STOREFRONT_CACHE_MAX_PRODUCTS")?;
        }
        let ttl_secs = env.parsed::<u64>("STOREFRONT_CACHE_TTL_SECS")?;
        if let Some(ttl) = ttl_secs {
            at_least_one(ttl, "STOREFRONT_CACHE_TTL_SECS")?;
        }

        Ok(Self {
            api_url,
            api_token,
            page_size,
            http_timeout: Duration::from_secs(timeout_secs),
            cache: CachePolicy {
                max_products,
                ttl: ttl_secs.map(Duration::from_secs),
            },
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get an optional variable parsed as `T`.
    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }
}

fn at_least_one<T: PartialOrd + From<u8>>(value: T, key: &str) -> Result<(), ConfigError> {
    if value < T::from(1) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Reject values that are obviously copied from a template.
fn validate_not_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOREFRONT_API_URL", "https://api.example.com/v1/")]).unwrap();

        assert_eq!(config.api_url.as_str(), "https://api.example.com/v1/");
        assert!(config.api_token.is_none());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.cache, CachePolicy::default());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "STOREFRONT_API_URL"));
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(matches!(
            load(&[("STOREFRONT_API_URL", "not a url")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            load(&[("STOREFRONT_API_URL", "ftp://files.example.com")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STOREFRONT_API_URL", "http://localhost:8080"),
            ("STOREFRONT_API_TOKEN", "k9$Qz7!pLm2#"),
            ("STOREFRONT_PAGE_SIZE", "24"),
            ("STOREFRONT_HTTP_TIMEOUT_SECS", "5"),
            ("STOREFRONT_CACHE_MAX_PRODUCTS", "500"),
            ("STOREFRONT_CACHE_TTL_SECS", "300"),
            ("SENTRY_ENVIRONMENT", "staging"),
        ])
        .unwrap();

        assert_eq!(config.api_token.unwrap().expose_secret(), "k9$Qz7!pLm2#");
        assert_eq!(config.page_size, 24);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(
            config.cache,
            CachePolicy {
                max_products: Some(500),
                ttl: Some(Duration::from_secs(300)),
            }
        );
        assert_eq!(config.sentry_environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = load(&[
            ("STOREFRONT_API_URL", "https://api.example.com"),
            ("STOREFRONT_PAGE_SIZE", "0"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid environment variable STOREFRONT_PAGE_SIZE: must be at least 1"
        );
    }

    #[test]
    fn test_unparseable_number_rejected() {
        assert!(matches!(
            load(&[
                ("STOREFRONT_API_URL", "https://api.example.com"),
                ("STOREFRONT_CACHE_TTL_SECS", "soon"),
            ]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STOREFRONT_CACHE_TTL_SECS"
        ));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = load(&[
            ("STOREFRONT_API_URL", "https://api.example.com"),
            ("STOREFRONT_API_TOKEN", "  "),
            ("SENTRY_DSN", ""),
        ])
        .unwrap();
        assert!(config.api_token.is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let err = load(&[
            ("STOREFRONT_API_URL", "https://api.example.com"),
            ("STOREFRONT_API_TOKEN", "your-token-here"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = StorefrontConfig::new(Url::parse("https://api.example.com").unwrap());
        config.api_token = Some(SecretString::from("super_secret_api_token"));

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_token"));
    }
}
