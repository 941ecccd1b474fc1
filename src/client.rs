//! Outbound HTTP client.
//!
//! Wraps a [`reqwest::Client`] with the per-request timeout from config and
//! the development-host header injection: in development mode, requests whose
//! destination host matches the configured development host carry the extra
//! configured headers. Production requests are never decorated.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::{Config, DevelopmentConfig};
use crate::error::{PipelineError, Step};

pub struct ApiClient {
    client: Client,
    dev: Option<DevHeaders>,
}

struct DevHeaders {
    host: String,
    headers: HeaderMap,
}

impl DevHeaders {
    fn new(dev: &DevelopmentConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &dev.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid development header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid development header value for {}", name))?;
            headers.insert(name, value);
        }
        Ok(Self {
            host: dev.host.clone(),
            headers,
        })
    }
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let dev = match (&config.development, config.is_development()) {
            (Some(dev), true) => Some(DevHeaders::new(dev)?),
            _ => None,
        };

        Ok(Self { client, dev })
    }

    /// GET a JSON resource and decode it into `T`.
    ///
    /// Non-success statuses and transport failures map to
    /// [`PipelineError::Network`]; undecodable bodies map to
    /// [`PipelineError::Parse`]. Each call is bounded by the configured
    /// client timeout.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        step: Step,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, PipelineError> {
        let mut request = self.client.get(url.clone());
        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(dev) = &self.dev {
            if url.host_str() == Some(dev.host.as_str()) {
                request = request.headers(dev.headers.clone());
            }
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| PipelineError::Network { step, source })?;

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::Parse {
                step,
                detail: e.to_string(),
            })
    }
}
