use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;
use url::Url;

use crate::{
    domain::entities::payment_mode::PaymentMode,
    infra::{error::InfraError, http_client, stripe_client::STRIPE_API_BASE, webhook_signature},
};

/// Price the demo subscribes every customer to.
pub const DEFAULT_PRICE_ID: &str = "price_1IlcFMIpy8Je3Ch07urc2Ed4";

pub struct AppConfig {
    pub stripe_secret_key: SecretString,
    /// When unset, webhook payloads are accepted without signature verification.
    pub stripe_webhook_secret: Option<SecretString>,
    pub payment_mode: PaymentMode,
    pub static_dir: PathBuf,
    pub price_id: String,
    pub days_until_due: u32,
    pub bind_addr: SocketAddr,
    pub stripe_api_base: Url,
    /// Pinned `Stripe-Version` header, if any.
    pub stripe_api_version: Option<String>,
    pub stripe_timeout: Duration,
    pub stripe_max_retries: u32,
    pub webhook_tolerance_secs: i64,
    pub cors_origin: HeaderValue,
    /// Optional JSON log file in addition to console output.
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let stripe_secret_key: String = required_env("STRIPE_SECRET_KEY")?;
        let payment_mode = PaymentMode::from_stripe_key_prefix(&stripe_secret_key);
        let stripe_secret_key = SecretString::new(stripe_secret_key.into());

        let stripe_webhook_secret = optional_env("STRIPE_WEBHOOK_SECRET")
            .map(|secret| SecretString::new(secret.into()));

        let static_dir = PathBuf::from(required_env("STATIC_DIR")?);
        if !static_dir.is_dir() {
            return Err(InfraError::ConfigInvalid {
                var: "STATIC_DIR",
                reason: format!("{} is not a directory", static_dir.display()),
            });
        }

        let price_id: String = get_env_default("STRIPE_PRICE_ID", DEFAULT_PRICE_ID.to_string());
        let days_until_due: u32 = parsed_env("DAYS_UNTIL_DUE", 30)?;
        let bind_addr: SocketAddr =
            parsed_env("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let stripe_api_base: String =
            get_env_default("STRIPE_API_BASE", STRIPE_API_BASE.to_string());
        let stripe_api_base =
            Url::parse(&stripe_api_base).map_err(|e| InfraError::ConfigInvalid {
                var: "STRIPE_API_BASE",
                reason: e.to_string(),
            })?;

        let stripe_api_version = optional_env("STRIPE_API_VERSION");
        let stripe_timeout_secs: u64 = parsed_env(
            "STRIPE_TIMEOUT_SECS",
            http_client::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        let stripe_max_retries: u32 = parsed_env("STRIPE_MAX_RETRIES", 2)?;
        let webhook_tolerance_secs: i64 = parsed_env(
            "WEBHOOK_TOLERANCE_SECS",
            webhook_signature::DEFAULT_TOLERANCE_SECS,
        )?;

        let cors_origin: String =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:8080"));
        let cors_origin = HeaderValue::from_str(&cors_origin).map_err(|e| {
            InfraError::ConfigInvalid {
                var: "CORS_ORIGIN",
                reason: e.to_string(),
            }
        })?;

        let log_file = optional_env("LOG_FILE").map(PathBuf::from);

        Ok(Self {
            stripe_secret_key,
            stripe_webhook_secret,
            payment_mode,
            static_dir,
            price_id,
            days_until_due,
            bind_addr,
            stripe_api_base,
            stripe_api_version,
            stripe_timeout: Duration::from_secs(stripe_timeout_secs),
            stripe_max_retries,
            webhook_tolerance_secs,
            cors_origin,
            log_file,
        })
    }
}

fn required_env(var: &'static str) -> Result<String, InfraError> {
    optional_env(var).ok_or(InfraError::ConfigMissing { var })
}

/// Typed variable with a default; an unparseable value is `ConfigInvalid`.
/// (`get_env_default` is only used for plain strings, since it panics on parse failure.)
fn parsed_env<T>(var: &'static str, default: T) -> Result<T, InfraError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_env_value(var, optional_env(var), default)
}

fn parse_env_value<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, InfraError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| InfraError::ConfigInvalid {
            var,
            reason: e.to_string(),
        }),
    }
}

/// Unset and blank values are both treated as absent.
fn optional_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
