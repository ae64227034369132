//! Samsung Wallet provider tests against a local mock of the card API.

#![cfg(feature = "samsung")]

use serde_json::json;
use std::time::Duration;
use walletmux::{factory, presets, Config, ErrorKind, PassData, ProviderType, Template, WalletError};
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CARDS: &str = "/issuers/partner-01/services/membership/cards";

fn fixture() -> (Template, PassData) {
    let template = presets::membership("Gold Club", "Example Org").unwrap();
    let data = PassData::new(&template.id, "c1")
        .with_serial_number("M1")
        .with_field("member_name", "Ada Lovelace")
        .with_field("member_id", "0001")
        .with_barcode("M1", None);
    (template, data)
}

fn config(server: &MockServer) -> Config {
    Config::new(ProviderType::Samsung)
        .with_option("issuer_id", "partner-01")
        .with_option("service_id", "membership")
        .with_option("api_key", "sk-test")
        .with_option("api_base_url", server.uri())
}

#[tokio::test]
async fn test_lifecycle_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CARDS))
        .and(bearer_token("sk-test"))
        .and(header("x-partner-id", "partner-01"))
        .and(body_partial_json(json!({"refId": "M1", "status": "ACTIVE"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"shareUrl": "https://a.swallet.link/M1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/M1", CARDS)))
        .and(body_partial_json(json!({"fields": {"membership_level": "Gold"}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/M1/notifications", CARDS)))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/M1", CARDS)))
        .and(body_partial_json(json!({"status": "VOIDED"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = factory::new_provider(config(&server)).unwrap();
    let (template, data) = fixture();

    let record = provider.create(&data, &template).await.unwrap();
    assert_eq!(record.reference.as_deref(), Some("https://a.swallet.link/M1"));

    let artifact = provider.generate_artifact(&record, &template).await.unwrap();
    assert_eq!(artifact.as_reference(), Some("https://a.swallet.link/M1"));

    let updated = provider
        .update(&record, &data.clone().with_field("membership_level", "Gold"), &template)
        .await
        .unwrap();
    assert!(provider.notify(&updated).await.unwrap());

    let voided = provider.void(&updated, &template).await.unwrap();
    assert!(voided.is_voided());

    server.verify().await;
}

#[tokio::test]
async fn test_error_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown service"))
        .mount(&server)
        .await;

    let provider = factory::new_provider(config(&server)).unwrap();
    let (template, data) = fixture();
    let err = provider.create(&data, &template).await.unwrap_err();

    match err {
        WalletError::ProviderApi {
            provider,
            status,
            body,
        } => {
            assert_eq!(provider, "samsung");
            assert_eq!(status, Some(422));
            assert_eq!(body, "unknown service");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_timeout_is_provider_error_without_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let provider = factory::new_provider(
        config(&server).with_request_timeout(Duration::from_millis(50)),
    )
    .unwrap();
    let (template, data) = fixture();
    let err = provider.create(&data, &template).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderApi);
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn test_artifact_without_share_url_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let provider = factory::new_provider(config(&server)).unwrap();
    let (template, data) = fixture();
    let record = provider.create(&data, &template).await.unwrap();

    let err = provider.generate_artifact(&record, &template).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
