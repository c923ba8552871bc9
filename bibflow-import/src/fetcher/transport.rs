//! HTTP transport collaborator
//!
//! Providers only see [`TransportResponse::Body`] or [`TransportResponse::Empty`];
//! status codes are interpreted here and nowhere else.

use crate::error::TransportError;
use async_trait::async_trait;
use bibflow_common::config::FetchConfig;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// One GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    /// `Accept` header, for content negotiation
    pub accept: Option<String>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: None,
        }
    }

    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        self.accept = Some(media_type.into());
        self
    }
}

/// Raw outcome of a successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    Body(Vec<u8>),
    /// The remote side has nothing for this request
    Empty,
}

/// Performs network calls on behalf of providers
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
///
/// Caps in-flight requests process-wide and rate limits outgoing calls.
pub struct HttpTransport {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            in_flight: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        self.rate_limiter.until_ready().await;

        debug!(url = %request.url, "GET");
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self.client.get(url);
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(TransportResponse::Empty);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: request.url,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(TransportResponse::Empty);
        }
        Ok(TransportResponse::Body(body.to_vec()))
    }
}
