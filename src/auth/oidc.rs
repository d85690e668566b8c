use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::domain::actor::Actor;

use super::AuthError;

/// Where the identity provider lives and how this client talks to it.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer_url: String,
    pub realm: String,
    pub client_id: String,
    /// Access tokens are refreshed this long before they actually expire.
    pub refresh_leeway: Duration,
}

/// Access/refresh token pair with locally computed expiry instants.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    fn from_response(response: TokenResponse) -> Self {
        let now = Utc::now();
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + chrono::Duration::seconds(response.expires_in),
            refresh_expires_at: response
                .refresh_expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }

    /// True once the access token is inside the refresh window.
    pub fn expires_within(&self, leeway: Duration) -> bool {
        let leeway = chrono::Duration::seconds(leeway.as_secs() as i64);
        Utc::now() + leeway >= self.expires_at
    }

    pub fn refresh_expired(&self) -> bool {
        match self.refresh_expires_at {
            Some(at) => Utc::now() >= at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_expires_in: Option<i64>,
}

/// Claims read from the userinfo endpoint. Tokens are opaque to this crate;
/// identity always comes from the provider, never from decoding a JWT.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "preferred_username")]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl Identity {
    /// Human-readable name, falling back to the username when the provider
    /// carries no profile names.
    pub fn display_name(&self) -> String {
        let full = match (&self.given_name, &self.family_name) {
            (Some(given), Some(family)) => format!("{} {}", given, family),
            (Some(given), None) => given.clone(),
            (None, Some(family)) => family.clone(),
            (None, None) => String::new(),
        };
        if full.trim().is_empty() {
            self.username.clone()
        } else {
            full
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            username: self.username.clone(),
            display_name: self.display_name(),
        }
    }
}

/// Identity-provider operations the session layer depends on. Trait seam
/// so sessions can be driven by a scripted provider in tests; [`OidcClient`]
/// is the production implementation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<TokenSet, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;
    async fn userinfo(&self, access_token: &str) -> Result<Identity, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    /// How long before actual expiry an access token counts as stale.
    fn refresh_leeway(&self) -> Duration;
}

/// Client for one realm of the identity provider.
pub struct OidcClient {
    http: reqwest::Client,
    config: OidcConfig,
}

impl OidcClient {
    pub fn new(config: OidcConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.config.issuer_url.trim_end_matches('/'),
            self.config.realm,
            leaf
        )
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, AuthError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "token request rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }
        let tokens: TokenResponse = response.json().await.map_err(|err| AuthError::Decode {
            detail: err.to_string(),
        })?;
        Ok(TokenSet::from_response(tokens))
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    /// Direct-grant sign-in with username and password.
    async fn login(&self, username: &str, password: &str) -> Result<TokenSet, AuthError> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", username),
            ("password", password),
        ];
        self.token_request(&form).await
    }

    /// Trades a refresh token for a fresh pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.token_request(&form).await
    }

    /// Asks the provider who the token belongs to.
    async fn userinfo(&self, access_token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .get(self.endpoint("userinfo"))
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|err| AuthError::Decode {
            detail: err.to_string(),
        })
    }

    /// Refresh-token revocation, called on sign-out.
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        let response = self
            .http
            .post(self.endpoint("logout"))
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn refresh_leeway(&self) -> Duration {
        self.config.refresh_leeway
    }
}
