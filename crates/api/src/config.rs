//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `ATELIER_TOKEN_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ATELIER_HOST` - Bind address (default: 127.0.0.1)
//! - `ATELIER_PORT` - Listen port (default: 4000)
//! - `ATELIER_PUBLIC_URL` - Public URL of this API, used for upload URLs and
//!   gateway callbacks (default: <http://localhost:4000>)
//! - `ATELIER_FRONTEND_URL` - SPA origin, used for payment redirects
//!   (default: <http://localhost:5173>)
//! - `ATELIER_CORS_ORIGINS` - Extra comma-separated allowed origins
//! - `ATELIER_TOKEN_TTL_HOURS` - Bearer token lifetime (default: 168)
//! - `ATELIER_UPLOAD_DIR` - Upload directory (default: uploads)
//! - `ATELIER_MAX_UPLOAD_BYTES` - Per-file upload limit (default: 5 MiB)
//! - `ATELIER_CURRENCY` - Store currency (default: INR)
//! - `ATELIER_SHIPPING_FEE` - Flat shipping fee (default: 0)
//! - `ATELIER_FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is waived
//! - `ATELIER_LOW_STOCK_THRESHOLD` - Dashboard low-stock cut-off (default: 5)
//! - `ATELIER_PAYMENT_ATTEMPT_TTL_MINUTES` - PayU attempt lifetime (default: 30)
//! - `MAIL_FROM`, `CONTACT_INBOX` - Sender and contact-form recipient
//! - `MAILGUN_API_KEY`, `MAILGUN_DOMAIN`, `MAILGUN_BASE_URL` - Mailgun provider
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD` - SMTP provider
//! - `PAYU_MERCHANT_KEY`, `PAYU_MERCHANT_SALT`, `PAYU_BASE_URL` - PayU gateway
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - Sentry error tracking
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use atelier_core::{CurrencyCode, Money};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MAILGUN_BASE_URL: &str = "https://api.mailgun.net";
const DEFAULT_PAYU_BASE_URL: &str = "https://test.payu.in";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API
    pub public_url: String,
    /// Base URL of the single-page app
    pub frontend_url: String,
    /// Origins allowed by CORS (always includes `frontend_url`)
    pub cors_origins: Vec<String>,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime in hours
    pub token_ttl_hours: i64,
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    /// Per-file upload size limit in bytes
    pub max_upload_bytes: usize,
    /// Pricing and inventory settings
    pub store: StoreConfig,
    /// Outgoing email settings
    pub email: EmailConfig,
    /// PayU gateway settings (PayU checkout is disabled when absent)
    pub payu: Option<PayuConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 - 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate (0.0 - 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub log_json: bool,
}

/// Store-wide pricing and inventory settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Currency all prices are expressed in
    pub currency: CurrencyCode,
    /// Flat shipping fee added to every order
    pub shipping_fee: Money,
    /// Subtotal at or above which shipping is free
    pub free_shipping_threshold: Option<Money>,
    /// Products at or below this stock level are reported as low stock
    pub low_stock_threshold: i32,
    /// Minutes before an unpaid PayU attempt expires
    pub payment_attempt_ttl_minutes: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            shipping_fee: Decimal::ZERO,
            free_shipping_threshold: None,
            low_stock_threshold: 5,
            payment_attempt_ttl_minutes: 30,
        }
    }
}

/// Outgoing email configuration.
///
/// Providers are tried in order: Mailgun, then SMTP. With neither configured
/// emails are skipped and logged.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Sender address
    pub from_address: String,
    /// Recipient for contact-form messages
    pub contact_inbox: Option<String>,
    /// Mailgun HTTP API settings
    pub mailgun: Option<MailgunConfig>,
    /// SMTP relay settings
    pub smtp: Option<SmtpConfig>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: "Atelier <no-reply@localhost>".to_string(),
            contact_inbox: None,
            mailgun: None,
            smtp: None,
        }
    }
}

/// Mailgun HTTP API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct MailgunConfig {
    pub api_key: SecretString,
    pub domain: String,
    pub base_url: String,
}

impl std::fmt::Debug for MailgunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailgunConfig")
            .field("api_key", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// PayU merchant configuration.
///
/// Implements `Debug` manually to redact the salt.
#[derive(Clone)]
pub struct PayuConfig {
    pub merchant_key: String,
    pub merchant_salt: SecretString,
    pub base_url: String,
}

impl std::fmt::Debug for PayuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayuConfig")
            .field("merchant_key", &self.merchant_key)
            .field("merchant_salt", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ATELIER_DATABASE_URL")?;
        let host = parse_env("ATELIER_HOST", "127.0.0.1")?;
        let port = parse_env("ATELIER_PORT", "4000")?;
        let public_url = trim_url(&get_env_or_default(
            "ATELIER_PUBLIC_URL",
            "http://localhost:4000",
        ));
        let frontend_url = trim_url(&get_env_or_default(
            "ATELIER_FRONTEND_URL",
            "http://localhost:5173",
        ));
        let cors_origins = parse_origins(
            &frontend_url,
            get_optional_env("ATELIER_CORS_ORIGINS").as_deref(),
        );

        let token_secret = get_validated_secret("ATELIER_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "ATELIER_TOKEN_SECRET")?;
        let token_ttl_hours: i64 = parse_env("ATELIER_TOKEN_TTL_HOURS", "168")?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ATELIER_TOKEN_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let upload_dir = PathBuf::from(get_env_or_default("ATELIER_UPLOAD_DIR", "uploads"));
        let max_upload_bytes = parse_env(
            "ATELIER_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        let store = StoreConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let payu = PayuConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            public_url,
            frontend_url,
            cors_origins,
            token_secret,
            token_ttl_hours,
            upload_dir,
            max_upload_bytes,
            store,
            email,
            payu,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
            log_json: get_optional_env("LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let currency = parse_env("ATELIER_CURRENCY", defaults.currency.code())?;
        let shipping_fee = parse_money("ATELIER_SHIPPING_FEE", "0")?;
        let free_shipping_threshold = get_optional_env("ATELIER_FREE_SHIPPING_THRESHOLD")
            .map(|raw| parse_money_value("ATELIER_FREE_SHIPPING_THRESHOLD", &raw))
            .transpose()?;

        Ok(Self {
            currency,
            shipping_fee,
            free_shipping_threshold,
            low_stock_threshold: parse_env("ATELIER_LOW_STOCK_THRESHOLD", "5")?,
            payment_attempt_ttl_minutes: parse_env("ATELIER_PAYMENT_ATTEMPT_TTL_MINUTES", "30")?,
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mailgun = match (
            get_optional_env("MAILGUN_API_KEY"),
            get_optional_env("MAILGUN_DOMAIN"),
        ) {
            (Some(api_key), Some(domain)) => Some(MailgunConfig {
                api_key: SecretString::from(api_key),
                domain,
                base_url: trim_url(&get_env_or_default(
                    "MAILGUN_BASE_URL",
                    DEFAULT_MAILGUN_BASE_URL,
                )),
            }),
            _ => None,
        };

        let smtp = match get_optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", "587")?,
                username: get_required_env("SMTP_USERNAME")?,
                password: get_required_secret("SMTP_PASSWORD")?,
            }),
            None => None,
        };

        Ok(Self {
            from_address: get_optional_env("MAIL_FROM")
                .unwrap_or_else(|| Self::default().from_address),
            contact_inbox: get_optional_env("CONTACT_INBOX"),
            mailgun,
            smtp,
        })
    }
}

impl PayuConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(merchant_key) = get_optional_env("PAYU_MERCHANT_KEY") else {
            return Ok(None);
        };

        Ok(Some(Self {
            merchant_key,
            merchant_salt: get_validated_secret("PAYU_MERCHANT_SALT")?,
            base_url: trim_url(&get_env_or_default("PAYU_BASE_URL", DEFAULT_PAYU_BASE_URL)),
        }))
    }

    /// Hosted checkout form action URL.
    #[must_use]
    pub fn payment_url(&self) -> String {
        format!("{}/_payment", self.base_url)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_money(key: &str, default: &str) -> Result<Money, ConfigError> {
    parse_money_value(key, &get_env_or_default(key, default))
}

fn parse_money_value(key: &str, raw: &str) -> Result<Money, ConfigError> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(amount)
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Build the CORS allow-list: the SPA origin plus any extra origins.
fn parse_origins(frontend_url: &str, extra: Option<&str>) -> Vec<String> {
    let mut origins = vec![frontend_url.to_string()];
    for origin in extra.unwrap_or_default().split(',').map(trim_url) {
        if !origin.is_empty() && !origins.contains(&origin) {
            origins.push(origin);
        }
    }
    origins
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= \
                 {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Configuration used by unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/atelier_test".to_string()),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 4000,
        public_url: "http://localhost:4000".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        token_secret: SecretString::from("k3Jx9!qLm2@Zp7#Rt4$Wv8%Yb1^Nc6&Hd0".to_string()),
        token_ttl_hours: 168,
        upload_dir: std::env::temp_dir().join("atelier-test-uploads"),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        store: StoreConfig::default(),
        email: EmailConfig::default(),
        payu: Some(PayuConfig {
            merchant_key: "gtKFFx".to_string(),
            merchant_salt: SecretString::from("4R38IvwiV57FwVpsgOvTXBdLE4tHUXFW".to_string()),
            base_url: DEFAULT_PAYU_BASE_URL.to_string(),
        }),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
        log_json: false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-token-secret-goes-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_token_secret_too_short() {
        let secret = SecretString::from("aB3$xY9!".to_string());
        assert!(validate_token_secret(&secret, "TEST_TOKEN").is_err());
    }

    #[test]
    fn test_test_config_secret_passes_validation() {
        let config = test_config();
        let secret = config.token_secret.expose_secret();
        assert!(validate_secret_strength(secret, "ATELIER_TOKEN_SECRET").is_ok());
        assert!(validate_token_secret(&config.token_secret, "ATELIER_TOKEN_SECRET").is_ok());
    }

    #[test]
    fn test_parse_origins_deduplicates_and_trims() {
        let origins = parse_origins(
            "http://localhost:5173",
            Some(" https://shop.example.in/ , http://localhost:5173,,"),
        );
        assert_eq!(
            origins,
            vec![
                "http://localhost:5173".to_string(),
                "https://shop.example.in".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_money_value_rejects_negative() {
        assert!(parse_money_value("FEE", "-10").is_err());
        assert!(parse_money_value("FEE", "abc").is_err());
        assert_eq!(
            parse_money_value("FEE", "49.50").unwrap(),
            Decimal::new(4950, 2)
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_payu_config_debug_redacts_salt() {
        let config = PayuConfig {
            merchant_key: "merchant_key_value".to_string(),
            merchant_salt: SecretString::from("super_secret_salt".to_string()),
            base_url: DEFAULT_PAYU_BASE_URL.to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("merchant_key_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_salt"));
        assert_eq!(config.payment_url(), "https://test.payu.in/_payment");
    }
}
