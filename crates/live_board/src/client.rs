//! HTTP client for the lives API
//!
//! Reads are anonymous. Admin operations need a bearer token, obtained with
//! [`ApiClient::login`] and attached with [`ApiClient::with_token`].

use crate::error::{Error, Result};
use async_trait::async_trait;
use domain::{Live, NewLive};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default base URL of the lives API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Default timeout for HTTP requests (15 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Anything that can hand out live records
#[async_trait]
pub trait LivesSource: Send + Sync + 'static {
    /// Records newest first, optionally restricted to one liveness state
    async fn fetch_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>>;
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Lives API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://host:5000/api`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        // Validate once so that later joins cannot fail
        Url::parse(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token to admin requests
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(Error::Unauthorized("not logged in".to_string())),
        }
    }

    /// List records, newest first
    pub async fn list_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>> {
        let mut request = self.client.get(self.endpoint("lives"));
        if let Some(flag) = is_live {
            request = request.query(&[("isLive", flag.to_string())]);
        }
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .client
            .post(self.endpoint("users/login"))
            .json(&body)
            .send()
            .await?;
        let login: LoginBody = check(response).await?.json().await?;
        tracing::info!(email = %email, "logged in");
        Ok(login.token)
    }

    /// Register a live; the server normalizes the URL
    pub async fn create_live(&self, new: &NewLive) -> Result<Live> {
        let request = self.authorized(self.client.post(self.endpoint("lives")).json(new))?;
        let live: Live = check(request.send().await?).await?.json().await?;
        tracing::info!(id = %live.id, url = %live.url, "live created");
        Ok(live)
    }

    pub async fn delete_live(&self, id: &str) -> Result<()> {
        let request = self.authorized(self.client.delete(self.endpoint(&format!("lives/{id}"))))?;
        check(request.send().await?).await?;
        tracing::info!(id = %id, "live deleted");
        Ok(())
    }
}

#[async_trait]
impl LivesSource for ApiClient {
    async fn fetch_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>> {
        self.list_lives(is_live).await
    }
}

/// Map non-success statuses to [`Error`], keeping the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });

    tracing::warn!(status = status.as_u16(), message = %message, "API request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::Rejected(message)
        }
        _ => Error::Status {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(client.endpoint("lives"), "http://localhost:5000/api/lives");
        assert_eq!(client.endpoint("/users/login"), "http://localhost:5000/api/users/login");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(ApiClient::new("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn admin_calls_need_a_token() {
        let client = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        let err = client.delete_live("1").await.unwrap_err();
        assert!(err.is_auth());
    }
}
