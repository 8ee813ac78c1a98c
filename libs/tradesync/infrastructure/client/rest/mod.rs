//! REST client for the trading backend
//!
//! Split into focused modules:
//! - `queries`: order, position and summary fetches used for resync
//! - `helpers`: response validation and body unwrapping

mod helpers;
mod queries;

use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),
}

pub type Result<T> = std::result::Result<T, RestError>;

/// REST client for the trading backend
pub struct RestClient {
    pub(crate) base_url: String,
    pub(crate) client: Client,
    token: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    /// Replace (or clear) the bearer token sent with every request
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(url);
        match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RestClient::new("https://api.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
    }
}
