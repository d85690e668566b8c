pub mod oidc;
pub mod session;

use thiserror::Error;

pub use session::Session;

/// How identity-provider interactions fail.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider rejected the request (status {status})")]
    Rejected { status: u16 },
    #[error("session expired, sign in again")]
    SessionExpired,
    #[error("could not reach the identity provider: {0}")]
    Network(#[from] reqwest::Error),
    #[error("identity provider answer did not match the expected shape: {detail}")]
    Decode { detail: String },
}

/// Bearer proof handed to the record store. The token never shows up in
/// `Debug` output, so it cannot leak through logs.
#[derive(Clone)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw bearer token. Keep the result out of log lines.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}
