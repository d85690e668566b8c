use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::actor::Actor;

use super::oidc::{Identity, IdentityProvider, TokenSet};
use super::{AuthError, Credentials};

/// A signed-in user: identity claims plus the token pair proving them.
/// Hands out bearer credentials, refreshing behind the leeway window so
/// callers never see an almost-expired token.
pub struct Session {
    identity: Identity,
    tokens: RwLock<TokenSet>,
    oidc: Arc<dyn IdentityProvider>,
}

impl Session {
    /// Signs in with the direct grant and resolves the identity claims.
    pub async fn establish(
        oidc: Arc<dyn IdentityProvider>,
        username: &str,
        password: &str,
    ) -> Result<Self, AuthError> {
        let tokens = oidc.login(username, password).await?;
        let identity = oidc.userinfo(&tokens.access_token).await?;
        info!(username = %identity.username, "session established");
        Ok(Self::from_parts(oidc, identity, tokens))
    }

    /// Rebuilds a session from persisted tokens, refreshing stale ones.
    pub async fn resume(
        oidc: Arc<dyn IdentityProvider>,
        tokens: TokenSet,
    ) -> Result<Self, AuthError> {
        let tokens = if tokens.expires_within(oidc.refresh_leeway()) {
            if tokens.refresh_expired() {
                return Err(AuthError::SessionExpired);
            }
            oidc.refresh(&tokens.refresh_token).await?
        } else {
            tokens
        };
        let identity = oidc.userinfo(&tokens.access_token).await?;
        info!(username = %identity.username, "session resumed");
        Ok(Self::from_parts(oidc, identity, tokens))
    }

    /// Assembles a session from already-verified parts, skipping the
    /// userinfo round trip.
    pub fn from_parts(
        oidc: Arc<dyn IdentityProvider>,
        identity: Identity,
        tokens: TokenSet,
    ) -> Self {
        Self {
            identity,
            tokens: RwLock::new(tokens),
            oidc,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn actor(&self) -> Actor {
        self.identity.actor()
    }

    /// Current bearer proof. Refreshes once the access token enters the
    /// leeway window; fails with `SessionExpired` when the refresh token
    /// is gone too.
    pub async fn credentials(&self) -> Result<Credentials, AuthError> {
        let leeway = self.oidc.refresh_leeway();
        {
            let tokens = self.tokens.read().await;
            if !tokens.expires_within(leeway) {
                return Ok(Credentials::new(tokens.access_token.clone()));
            }
        }
        let mut tokens = self.tokens.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if tokens.expires_within(leeway) {
            if tokens.refresh_expired() {
                return Err(AuthError::SessionExpired);
            }
            *tokens = self.oidc.refresh(&tokens.refresh_token).await?;
            debug!(username = %self.identity.username, "access token refreshed");
        }
        Ok(Credentials::new(tokens.access_token.clone()))
    }

    /// Revokes the refresh token. Failures are logged, not surfaced;
    /// sign-out always succeeds locally.
    pub async fn revoke(&self) {
        let refresh_token = self.tokens.read().await.refresh_token.clone();
        if let Err(err) = self.oidc.logout(&refresh_token).await {
            warn!(error = %err, "refresh token revocation failed");
        }
    }
}
