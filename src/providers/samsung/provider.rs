//! Samsung Wallet provider implementation.

use crate::config::ProviderType;
use crate::http::ApiClient;
use crate::session::{AccessToken, Session};
use crate::{Artifact, Config, PassData, PassRecord, Provider, Result, Template, WalletError};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::info;

const DEFAULT_API_BASE_URL: &str = "https://api.wallet.samsung.com/v1";
const PARTNER_HEADER: &str = "x-partner-id";

/// Samsung Wallet provider.
pub struct SamsungProvider {
    name: String,
    issuer_id: String,
    service_id: String,
    api_key: AccessToken,
    client: ApiClient,
}

impl SamsungProvider {
    /// Creates the provider from configuration.
    ///
    /// # Errors
    ///
    /// [`WalletError::Configuration`] if `issuer_id`, `service_id` or
    /// `api_key` is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let name = config.provider_name();
        let base_url = config
            .get_option("api_base_url")
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_BASE_URL);

        Ok(Self {
            issuer_id: config.require_option("issuer_id")?.to_string(),
            service_id: config.require_option("service_id")?.to_string(),
            api_key: AccessToken::new(config.require_option("api_key")?),
            client: ApiClient::new(&name, base_url, config.request_timeout)?,
            name,
        })
    }

    fn cards_path(&self) -> String {
        format!("/issuers/{}/services/{}/cards", self.issuer_id, self.service_id)
    }

    fn card_path(&self, serial_number: &str) -> String {
        format!("{}/{}", self.cards_path(), serial_number)
    }

    /// Card body for the pass.
    fn card(&self, data: &PassData, template: &Template) -> Result<Value> {
        let resolved = template.resolve(data)?;
        let barcode = template.barcode(data)?;

        let fields: Map<String, Value> = resolved
            .iter()
            .map(|r| (r.field.key.clone(), json!(r.value.to_string())))
            .collect();

        let mut card = Map::new();
        card.insert("refId".into(), json!(data.serial_number));
        card.insert("templateId".into(), json!(template.id));
        card.insert("customerId".into(), json!(data.customer_id));
        card.insert("title".into(), json!(template.name));
        card.insert(
            "status".into(),
            json!(if data.voided { "VOIDED" } else { "ACTIVE" }),
        );
        card.insert("fields".into(), Value::Object(fields));
        if let Some((format, message)) = barcode {
            card.insert(
                "barcode".into(),
                json!({"format": format, "value": message, "altText": data.barcode_alt_text}),
            );
        }
        if let Some(expires) = data.expiration_date {
            card.insert(
                "expiry".into(),
                json!(expires.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        Ok(Value::Object(card))
    }

    async fn send(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        self.client
            .send(
                self.client
                    .request(method, path)
                    .bearer_auth(self.api_key.token())
                    .header(PARTNER_HEADER, &self.issuer_id)
                    .json(body),
            )
            .await
    }
}

#[async_trait]
impl Provider for SamsungProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Samsung
    }

    fn pass_id(&self, serial_number: &str) -> String {
        serial_number.to_string()
    }

    async fn create(&self, data: &PassData, template: &Template) -> Result<PassRecord> {
        let body = self.card(data, template)?;
        let response = self.send(Method::POST, &self.cards_path(), &body).await?;

        let pass_id = self.pass_id(&data.serial_number);
        let mut record = PassRecord::new(&self.name, &pass_id, data, template);
        record.reference = response
            .get("shareUrl")
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(provider = %self.name, pass_id = %pass_id, "Created wallet card");
        Ok(record)
    }

    async fn update(
        &self,
        record: &PassRecord,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord> {
        let body = self.card(data, template)?;
        self.send(Method::PUT, &self.card_path(&record.serial_number), &body)
            .await?;
        Ok(record.with_data(data, template))
    }

    async fn void(&self, record: &PassRecord, _template: &Template) -> Result<PassRecord> {
        self.send(
            Method::PATCH,
            &self.card_path(&record.serial_number),
            &json!({"status": "VOIDED"}),
        )
        .await?;
        Ok(record.voided())
    }

    async fn generate_artifact(&self, record: &PassRecord, _template: &Template) -> Result<Artifact> {
        record
            .reference
            .clone()
            .map(Artifact::Reference)
            .ok_or_else(|| {
                WalletError::NotFound(format!(
                    "{} returned no share URL for pass {}",
                    self.name, record.pass_id
                ))
            })
    }

    async fn notify(&self, record: &PassRecord) -> Result<bool> {
        self.send(
            Method::POST,
            &format!("{}/notifications", self.card_path(&record.serial_number)),
            &json!({"type": "UPDATED", "revision": record.revision}),
        )
        .await?;
        Ok(true)
    }
}
