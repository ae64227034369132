//! Google Wallet provider tests against a local mock of the object API.

#![cfg(feature = "google")]

use serde_json::json;
use walletmux::{factory, presets, Config, ErrorKind, PassData, Provider, ProviderType, Template};
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture() -> (Template, PassData) {
    let template = presets::event_ticket("Summer Gala", "Example Org").unwrap();
    let data = PassData::new(&template.id, "c1")
        .with_serial_number("S1")
        .with_field("event_date", "2025-06-01")
        .with_barcode("T1", None);
    (template, data)
}

fn provider(server: &MockServer) -> Box<dyn Provider> {
    factory::new_provider(
        Config::new(ProviderType::Google)
            .with_option("issuer_id", "3388")
            .with_option("access_token", "static-token")
            .with_option("api_base_url", server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_create_posts_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/eventTicketObject"))
        .and(bearer_token("static-token"))
        .and(body_partial_json(json!({
            "id": "3388.S1",
            "classId": "3388.summer-gala",
            "state": "ACTIVE",
            "barcode": {"type": "QR_CODE", "value": "T1"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "3388.S1"})))
        .expect(1)
        .mount(&server)
        .await;

    let (template, data) = fixture();
    let record = provider(&server).create(&data, &template).await.unwrap();

    assert_eq!(record.pass_id, "3388.S1");
    assert_eq!(
        record.reference,
        Some(format!("{}/eventTicketObject/3388.S1", server.uri()))
    );
}

#[tokio::test]
async fn test_create_twice_updates_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/eventTicketObject"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "3388.S1"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/eventTicketObject"))
        .respond_with(ResponseTemplate::new(409).set_body_string("object already exists"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/eventTicketObject/3388.S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "3388.S1"})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let (template, data) = fixture();
    let first = provider.create(&data, &template).await.unwrap();
    let second = provider.create(&data, &template).await.unwrap();

    assert_eq!(first.pass_id, second.pass_id);
    server.verify().await;
}

#[tokio::test]
async fn test_update_and_void() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/eventTicketObject/3388.S1"))
        .and(body_partial_json(json!({"state": "ACTIVE"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/eventTicketObject/3388.S1"))
        .and(body_partial_json(json!({"state": "INACTIVE"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let (template, data) = fixture();
    let record = provider.create(&data, &template).await.unwrap();
    let updated = provider
        .update(&record, &data.clone().with_field("ticket_type", "VIP"), &template)
        .await
        .unwrap();
    let voided = provider.void(&updated, &template).await.unwrap();

    assert!(voided.is_voided());
    assert!(provider.notify(&voided).await.unwrap());
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("issuer not approved"))
        .mount(&server)
        .await;

    let (template, data) = fixture();
    let err = provider(&server).create(&data, &template).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderApi);
    assert_eq!(err.http_status(), Some(403));
    assert!(err.to_string().contains("issuer not approved"));
}

#[tokio::test]
async fn test_artifact_without_service_account_is_object_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let (template, data) = fixture();
    let record = provider.create(&data, &template).await.unwrap();
    let artifact = provider.generate_artifact(&record, &template).await.unwrap();

    assert_eq!(artifact.as_reference(), record.reference.as_deref());
}

#[tokio::test]
async fn test_service_account_token_exchange_and_save_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "sa-token", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/eventTicketObject"))
        .and(bearer_token("sa-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(bearer_token("sa-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("service-account.json");
    std::fs::write(
        &key_file,
        json!({
            "type": "service_account",
            "client_email": "issuer@example.iam.gserviceaccount.com",
            "private_key": include_str!("fixtures/issuer.key"),
        })
        .to_string(),
    )
    .unwrap();

    let provider = factory::new_provider(
        Config::new(ProviderType::Google)
            .with_option("issuer_id", "3388")
            .with_option("service_account_file", key_file.to_string_lossy())
            .with_option("token_uri", format!("{}/token", server.uri()))
            .with_option("api_base_url", server.uri())
            .with_option("origins", "https://example.com"),
    )
    .unwrap();

    let (template, data) = fixture();
    let record = provider.create(&data, &template).await.unwrap();
    provider.void(&record, &template).await.unwrap();

    let artifact = provider.generate_artifact(&record, &template).await.unwrap();
    let link = artifact.as_reference().unwrap();
    assert!(link.starts_with("https://pay.google.com/gp/v/save/"));
    assert_eq!(link.rsplit('/').next().unwrap().split('.').count(), 3);

    server.verify().await;
}
