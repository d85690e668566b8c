use std::sync::Arc;
use std::time::Instant;

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Credentials;
use crate::config::ApiConfig;

use super::ApiError;

/// Shared plumbing for every record-store call: base-url joining, bearer
/// auth, per-request correlation ids, status mapping.
#[derive(Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    config: Arc<ApiConfig>,
}

impl Transport {
    pub(crate) fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) async fn get(&self, path: &str, creds: &Credentials) -> Result<Response, ApiError> {
        self.send::<()>(Method::GET, path, creds, None).await
    }

    pub(crate) async fn send_empty(
        &self,
        method: Method,
        path: &str,
        creds: &Credentials,
    ) -> Result<Response, ApiError> {
        self.send::<()>(method, path, creds, None).await
    }

    pub(crate) async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        creds: &Credentials,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.send(method, path, creds, Some(body)).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        creds: &Credentials,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(creds.reveal())
            .header("x-request-id", request_id.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        debug!(
            %request_id,
            %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "record store call"
        );
        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            s => Err(ApiError::Http { status: s.as_u16() }),
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json().await.map_err(|err| ApiError::Decode {
        detail: err.to_string(),
    })
}
