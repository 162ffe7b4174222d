use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::types::{HttpResponse, RequestDescriptor};

fn build_client(config: &ClientConfig) -> Result<Client, TransportError> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .cookie_store(true)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(TransportError::Client)
}

/// Sends built requests over a shared `reqwest` client.
#[derive(Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    pub async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        if !request.is_sendable() {
            return Err(TransportError::Unsendable {
                url: request.url.clone(),
            });
        }

        let url = reqwest::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "http request");
        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|source| TransportError::Request {
                method: request.method.to_string(),
                source,
            })?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis(),
            "http response"
        );

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|source| TransportError::Request {
                method: request.method.to_string(),
                source,
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Send and parse JSON, unwrapping the envelope member of list endpoints.
    pub async fn fetch_json(&self, request: &RequestDescriptor) -> Result<Value, TransportError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let json: Value = serde_json::from_str(&response.body)?;
        unwrap_keypath(json, request.keypath)
    }
}

fn unwrap_keypath(json: Value, keypath: Option<&str>) -> Result<Value, TransportError> {
    let Some(key) = keypath else {
        return Ok(json);
    };

    match json {
        Value::Object(mut map) => map.remove(key).ok_or_else(|| TransportError::MissingKey {
            key: key.to_string(),
        }),
        _ => Err(TransportError::MissingKey {
            key: key.to_string(),
        }),
    }
}
