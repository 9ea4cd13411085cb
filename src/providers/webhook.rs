// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic webhook provider backend.
//!
//! Delegates record management to an external HTTP service implementing a
//! four-endpoint contract:
//!
//! - `POST /create` with `{hostname, type, value, ttl, srv?}`
//! - `DELETE /delete` with `{hostname, type}`
//! - `GET /list` returning an array of the create shape
//! - `GET /ping` returning 200
//!
//! Requests authenticate with a bearer token or a custom header. Responses
//! of 429/502/503/504 are retried with exponential backoff; 404 on delete is
//! treated as success (the record is already gone) and 409 on create is the
//! distinct already-exists conflict.

use crate::constants::{HTTP_REQUEST_TIMEOUT_SECS, WEBHOOK_MAX_ATTEMPTS, WEBHOOK_RETRY_BASE_MILLIS};
use crate::dns_errors::DnsError;
use crate::providers::{Capabilities, DnsProvider, Record, RecordType, SrvData};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Authentication attached to every webhook request.
#[derive(Debug, Clone, Default)]
pub enum WebhookAuth {
    /// No authentication
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// Arbitrary header name/value pair
    Header {
        /// Header name
        name: String,
        /// Header value
        value: String,
    },
}

/// Wire shape of a record exchanged with the webhook service.
#[derive(Debug, Serialize, Deserialize)]
struct WebhookRecord {
    hostname: String,
    #[serde(rename = "type")]
    record_type: RecordType,
    value: String,
    ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    srv: Option<SrvData>,
}

impl From<&Record> for WebhookRecord {
    fn from(record: &Record) -> Self {
        Self {
            hostname: record.hostname.clone(),
            record_type: record.record_type,
            value: record.target.clone(),
            ttl: record.ttl,
            srv: record.srv,
        }
    }
}

impl From<WebhookRecord> for Record {
    fn from(wire: WebhookRecord) -> Self {
        let mut record = Record::new(&wire.hostname, wire.record_type, &wire.value, wire.ttl);
        record.srv = wire.srv;
        record
    }
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    hostname: &'a str,
    #[serde(rename = "type")]
    record_type: RecordType,
}

/// HTTP webhook backend.
pub struct WebhookProvider {
    base: Url,
    auth: WebhookAuth,
    client: HttpClient,
}

impl WebhookProvider {
    /// Create a webhook provider for the service at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::ConfigInvalid`] for an unparseable base URL.
    pub fn new(base: &str, auth: WebhookAuth) -> Result<Self, DnsError> {
        let base = Url::parse(base.trim_end_matches('/')).map_err(|e| DnsError::ConfigInvalid {
            reason: format!("invalid webhook URL '{base}': {e}"),
        })?;
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DnsError::ConfigInvalid {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { base, auth, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base.as_str().trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            WebhookAuth::None => request,
            WebhookAuth::Bearer(token) => request.header("Authorization", format!("Bearer {token}")),
            WebhookAuth::Header { name, value } => request.header(name.as_str(), value.as_str()),
        }
    }

    /// Issue a request, retrying throttle and gateway failures with
    /// exponential backoff. The final attempt's error wins.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, DnsError> {
        let mut delay = Duration::from_millis(WEBHOOK_RETRY_BASE_MILLIS);
        let mut last_err: Option<DnsError> = None;

        for attempt in 1..=WEBHOOK_MAX_ATTEMPTS {
            let request = self.authorize(build());
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if retryable(status) {
                        warn!(
                            endpoint = %self.base,
                            status = %status,
                            attempt,
                            "webhook request throttled or failed upstream, retrying"
                        );
                        last_err = Some(DnsError::from_status(
                            self.base.as_str(),
                            "",
                            status.as_u16(),
                            "retryable upstream failure",
                        ));
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    warn!(endpoint = %self.base, attempt, error = %e, "webhook request failed");
                    last_err = Some(DnsError::from_http(self.base.as_str(), &e));
                }
            }

            if attempt < WEBHOOK_MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(last_err.unwrap_or_else(|| DnsError::Transient {
            endpoint: self.base.to_string(),
            reason: "webhook request failed with no response".to_string(),
        }))
    }
}

fn retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

#[async_trait]
impl DnsProvider for WebhookProvider {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        let url = self.endpoint("/ping");
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DnsError::from_status(&url, "", status.as_u16(), &body))
        }
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        let url = self.endpoint("/list");
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DnsError::from_status(&url, "", status.as_u16(), &body));
        }
        let records: Vec<WebhookRecord> =
            response.json().await.map_err(|e| DnsError::Transient {
                endpoint: url.clone(),
                reason: format!("invalid list response: {e}"),
            })?;
        Ok(records.into_iter().map(Record::from).collect())
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        let url = self.endpoint("/create");
        let body = WebhookRecord::from(record);
        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body))
            .await?;
        let status = response.status();
        if status.is_success() {
            debug!(record = %record, "webhook create succeeded");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(DnsError::from_status(&url, &record.hostname, status.as_u16(), &text))
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        let url = self.endpoint("/delete");
        let body = serde_json::to_value(DeleteRequest {
            hostname: &record.hostname,
            record_type: record.record_type,
        })
        .map_err(|e| DnsError::Validation {
            hostname: record.hostname.clone(),
            reason: format!("failed to encode delete request: {e}"),
        })?;
        let response = self
            .send_with_retry(|| self.client.delete(&url).json(&body))
            .await?;
        let status = response.status();
        // 404 means the record is already gone, which is the desired state
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(record = %record, "webhook delete succeeded");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(DnsError::from_status(&url, &record.hostname, status.as_u16(), &text))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: true,
            supports_native_update: false,
            record_types: vec![
                RecordType::A,
                RecordType::Cname,
                RecordType::Txt,
                RecordType::Srv,
            ],
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod webhook_tests;
