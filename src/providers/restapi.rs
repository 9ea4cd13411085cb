// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Token-authenticated REST API provider backend.
//!
//! Speaks a conventional zone/records HTTP API:
//!
//! - `GET    {base}/zones/{zone}`              connectivity check
//! - `GET    {base}/zones/{zone}/records`      enumerate records
//! - `POST   {base}/zones/{zone}/records`      create a record
//! - `PUT    {base}/zones/{zone}/records/{id}` replace a record in place
//! - `DELETE {base}/zones/{zone}/records/{id}` delete a record
//!
//! All requests carry `Authorization: Bearer <token>`. Records created by
//! this system are deleted by backend id; a delete without an id falls back
//! to a list lookup and is a no-op when nothing matches.

use crate::constants::HTTP_REQUEST_TIMEOUT_SECS;
use crate::dns_errors::DnsError;
use crate::providers::{Capabilities, DnsProvider, Record, RecordType, SrvData};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize, Deserialize)]
struct ApiRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    hostname: String,
    #[serde(rename = "type")]
    record_type: RecordType,
    value: String,
    ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    srv: Option<SrvData>,
}

impl From<&Record> for ApiRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: None,
            hostname: record.hostname.clone(),
            record_type: record.record_type,
            value: record.target.clone(),
            ttl: record.ttl,
            srv: record.srv,
        }
    }
}

impl From<ApiRecord> for Record {
    fn from(wire: ApiRecord) -> Self {
        let mut record = Record::new(&wire.hostname, wire.record_type, &wire.value, wire.ttl);
        record.id = wire.id;
        record.srv = wire.srv;
        record
    }
}

/// REST API backend for one zone.
pub struct RestApiProvider {
    base: Url,
    zone: String,
    token: String,
    client: HttpClient,
}

impl RestApiProvider {
    /// Create a provider for `zone` behind the API at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::ConfigInvalid`] for an unparseable base URL.
    pub fn new(base: &str, zone: &str, token: &str) -> Result<Self, DnsError> {
        let base = Url::parse(base.trim_end_matches('/')).map_err(|e| DnsError::ConfigInvalid {
            reason: format!("invalid API URL '{base}': {e}"),
        })?;
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DnsError::ConfigInvalid {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base,
            zone: zone.trim_end_matches('.').to_ascii_lowercase(),
            token: token.to_string(),
            client,
        })
    }

    fn records_url(&self) -> String {
        format!(
            "{}/zones/{}/records",
            self.base.as_str().trim_end_matches('/'),
            self.zone
        )
    }

    async fn request(
        &self,
        hostname: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DnsError> {
        let response = builder
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| DnsError::from_http(self.base.as_str(), &e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DnsError::from_status(
            self.base.as_str(),
            hostname,
            status.as_u16(),
            &body,
        ))
    }

    /// Locate the backend id of a record matching `record`'s name and type.
    async fn find_id(&self, record: &Record) -> Result<Option<String>, DnsError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|r| r.hostname == record.hostname && r.record_type == record.record_type)
            .and_then(|r| r.id))
    }
}

#[async_trait]
impl DnsProvider for RestApiProvider {
    fn kind(&self) -> &'static str {
        "restapi"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        let url = format!(
            "{}/zones/{}",
            self.base.as_str().trim_end_matches('/'),
            self.zone
        );
        self.request("", self.client.get(&url)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        let response = self.request("", self.client.get(self.records_url())).await?;
        let records: Vec<ApiRecord> = response.json().await.map_err(|e| DnsError::Transient {
            endpoint: self.base.to_string(),
            reason: format!("invalid records response: {e}"),
        })?;
        Ok(records.into_iter().map(Record::from).collect())
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        let body = ApiRecord::from(record);
        match self
            .request(&record.hostname, self.client.post(self.records_url()).json(&body))
            .await
        {
            Ok(_) => {
                debug!(record = %record, zone = %self.zone, "API create succeeded");
                Ok(())
            }
            // An identical record already present is the desired state
            Err(DnsError::AlreadyExists { existing, .. })
                if existing.trim() == record.target.trim() =>
            {
                debug!(record = %record, "record already present, treating create as no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        let id = match &record.id {
            Some(id) => Some(id.clone()),
            None => self.find_id(record).await?,
        };
        let Some(id) = id else {
            debug!(record = %record, "record absent, treating delete as no-op");
            return Ok(());
        };

        let url = format!("{}/{id}", self.records_url());
        match self.request(&record.hostname, self.client.delete(&url)).await {
            Ok(_) => Ok(()),
            Err(DnsError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        let id = match &existing.id {
            Some(id) => Some(id.clone()),
            None => self.find_id(existing).await?,
        };
        let Some(id) = id else {
            // Nothing to replace, fall back to a plain create
            return self.create(desired).await;
        };

        let url = format!("{}/{id}", self.records_url());
        let body = ApiRecord::from(desired);
        self.request(&desired.hostname, self.client.put(&url).json(&body))
            .await?;
        debug!(record = %desired, zone = %self.zone, "API update succeeded");
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: true,
            supports_native_update: true,
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
#[path = "restapi_tests.rs"]
mod restapi_tests;
