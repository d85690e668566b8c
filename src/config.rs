use std::time::Duration;

use tracing::warn;

use crate::auth::oidc::OidcConfig;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_OIDC_URL: &str = "http://localhost:8180";
const DEFAULT_REALM: &str = "groupdesk";
const DEFAULT_CLIENT_ID: &str = "groupdesk-front";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Connection settings for the REST record store.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Everything the crate reads from the environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub oidc: OidcConfig,
}

impl AppConfig {
    /// Reads `GROUPDESK_*` variables, falling back to local-dev defaults.
    /// Malformed numeric values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig {
                base_url: env_or("GROUPDESK_API_URL", DEFAULT_API_URL),
                request_timeout: Duration::from_secs(env_parse(
                    "GROUPDESK_API_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )),
            },
            oidc: OidcConfig {
                issuer_url: env_or("GROUPDESK_OIDC_URL", DEFAULT_OIDC_URL),
                realm: env_or("GROUPDESK_OIDC_REALM", DEFAULT_REALM),
                client_id: env_or("GROUPDESK_OIDC_CLIENT_ID", DEFAULT_CLIENT_ID),
                refresh_leeway: Duration::from_secs(env_parse(
                    "GROUPDESK_OIDC_LEEWAY_SECS",
                    DEFAULT_LEEWAY_SECS,
                )),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable config value");
            default
        }),
        Err(_) => default,
    }
}
