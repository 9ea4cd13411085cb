// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the REST API provider, against a mock HTTP server.

use crate::dns_errors::DnsError;
use crate::providers::restapi::RestApiProvider;
use crate::providers::{DnsProvider, Record, RecordType};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record() -> Record {
    Record::new("app.example.com", RecordType::A, "10.0.0.5", 300)
}

#[tokio::test]
async fn test_ping_checks_zone_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/example.com"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.ping().await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/example.com"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "bad").unwrap();
    let err = provider.ping().await.unwrap_err();
    assert!(matches!(err, DnsError::Auth { .. }));
}

#[tokio::test]
async fn test_list_maps_backend_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/example.com/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "r1", "hostname": "a.example.com", "type": "A", "value": "10.0.0.1", "ttl": 300},
            {"id": "r2", "hostname": "b.example.com", "type": "CNAME", "value": "a.example.com", "ttl": 300}
        ])))
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    let records = provider.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id.as_deref(), Some("r1"));
    // Backend ids never participate in equality
    assert_eq!(
        records[0],
        Record::new("a.example.com", RecordType::A, "10.0.0.1", 300)
    );
}

#[tokio::test]
async fn test_create_posts_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zones/example.com/records"))
        .and(body_partial_json(json!({
            "hostname": "app.example.com",
            "type": "A",
            "value": "10.0.0.5"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.create(&record()).await.unwrap();
}

#[tokio::test]
async fn test_create_conflict_with_same_target_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zones/example.com/records"))
        .respond_with(ResponseTemplate::new(409).set_body_string("10.0.0.5"))
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.create(&record()).await.unwrap();
}

#[tokio::test]
async fn test_create_conflict_with_other_target_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/zones/example.com/records"))
        .respond_with(ResponseTemplate::new(409).set_body_string("10.0.0.9"))
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    let err = provider.create(&record()).await.unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_delete_by_looked_up_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/example.com/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "r9", "hostname": "app.example.com", "type": "A", "value": "10.0.0.5", "ttl": 300}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/zones/example.com/records/r9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.delete(&record()).await.unwrap();
}

#[tokio::test]
async fn test_delete_of_absent_record_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones/example.com/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.delete(&record()).await.unwrap();
}

#[tokio::test]
async fn test_update_replaces_in_place() {
    let server = MockServer::start().await;
    let mut existing = record();
    existing.id = Some("r5".to_string());
    existing.target = "10.0.0.9".to_string();

    Mock::given(method("PUT"))
        .and(path("/zones/example.com/records/r5"))
        .and(body_partial_json(json!({"value": "10.0.0.5"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RestApiProvider::new(&server.uri(), "example.com", "tok").unwrap();
    provider.update(&existing, &record()).await.unwrap();
}
