//! Google Wallet provider implementation.

use super::auth::{GoogleAuth, ServiceAccount};
use crate::config::ProviderType;
use crate::http::ApiClient;
use crate::session::AccessToken;
use crate::template::{BarcodeFormat, PassKind};
use crate::{Artifact, Config, PassData, PassRecord, Provider, Result, Template, WalletError};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

const DEFAULT_API_BASE_URL: &str = "https://walletobjects.googleapis.com/walletobjects/v1";
const DEFAULT_SAVE_URL: &str = "https://pay.google.com/gp/v/save";

/// Object type prefix for a pass kind.
fn object_kind(kind: PassKind) -> &'static str {
    match kind {
        PassKind::EventTicket => "eventTicket",
        PassKind::Coupon => "offer",
        PassKind::Loyalty => "loyalty",
        PassKind::BoardingPass => "flight",
        PassKind::Generic | PassKind::Membership | PassKind::StoreCard => "generic",
    }
}

fn barcode_type(format: BarcodeFormat) -> &'static str {
    match format {
        BarcodeFormat::Qr => "QR_CODE",
        BarcodeFormat::Pdf417 => "PDF_417",
        BarcodeFormat::Aztec => "AZTEC",
        BarcodeFormat::Code128 => "CODE_128",
    }
}

/// Google Wallet provider.
pub struct GoogleProvider {
    name: String,
    issuer_id: String,
    client: ApiClient,
    auth: GoogleAuth,
    save_url: String,
    origins: Vec<String>,
}

impl GoogleProvider {
    pub(crate) fn new(
        name: impl Into<String>,
        issuer_id: impl Into<String>,
        client: ApiClient,
        auth: GoogleAuth,
    ) -> Self {
        Self {
            name: name.into(),
            issuer_id: issuer_id.into(),
            client,
            auth,
            save_url: DEFAULT_SAVE_URL.to_string(),
            origins: Vec::new(),
        }
    }

    /// Creates the provider from configuration.
    ///
    /// # Errors
    ///
    /// [`WalletError::Configuration`] if `issuer_id` is missing, or neither
    /// `service_account_file` nor `access_token` is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let name = config.provider_name();
        let issuer_id = config.require_option("issuer_id")?;
        let base_url = config
            .get_option("api_base_url")
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_BASE_URL);
        let client = ApiClient::new(&name, base_url, config.request_timeout)?;

        let auth = if let Some(path) = config.get_option("service_account_file") {
            let token_uri = config.get_option("token_uri").map(String::as_str);
            GoogleAuth::service_account(ServiceAccount::from_file(path, token_uri)?)
        } else if let Some(token) = config.get_option("access_token") {
            GoogleAuth::Static(AccessToken::new(token))
        } else {
            return Err(WalletError::Configuration(format!(
                "{} provider requires option 'service_account_file' or 'access_token'",
                config.provider
            )));
        };

        let mut provider = Self::new(name, issuer_id, client, auth);
        if let Some(save_url) = config.get_option("save_url") {
            provider.save_url = save_url.trim_end_matches('/').to_string();
        }
        if let Some(origins) = config.get_option("origins") {
            provider.origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(provider)
    }

    fn class_id(&self, template: &Template) -> String {
        format!("{}.{}", self.issuer_id, template.id)
    }

    fn object_path(&self, kind: PassKind, object_id: Option<&str>) -> String {
        match object_id {
            Some(id) => format!("/{}Object/{}", object_kind(kind), id),
            None => format!("/{}Object", object_kind(kind)),
        }
    }

    /// Wallet object body for the pass.
    fn object(&self, object_id: &str, data: &PassData, template: &Template) -> Result<Value> {
        let resolved = template.resolve(data)?;
        let barcode = template.barcode(data)?;

        let mut object = Map::new();
        object.insert("id".into(), json!(object_id));
        object.insert("classId".into(), json!(self.class_id(template)));
        object.insert(
            "state".into(),
            json!(if data.voided { "INACTIVE" } else { "ACTIVE" }),
        );

        let modules: Vec<Value> = resolved
            .iter()
            .map(|r| {
                json!({
                    "id": r.field.key,
                    "header": r.field.label.clone().unwrap_or_default(),
                    "body": r.value.to_string(),
                })
            })
            .collect();
        object.insert("textModulesData".into(), json!(modules));

        if let Some((format, message)) = barcode {
            let mut code = Map::new();
            code.insert("type".into(), json!(barcode_type(format)));
            code.insert("value".into(), json!(message));
            if let Some(alt) = &data.barcode_alt_text {
                code.insert("alternateText".into(), json!(alt));
            }
            object.insert("barcode".into(), Value::Object(code));
        }

        if let Some(expires) = data.expiration_date {
            object.insert(
                "validTimeInterval".into(),
                json!({"end": {"date": expires.to_rfc3339_opts(SecondsFormat::Secs, true)}}),
            );
        }
        if template.style.background_color.starts_with('#') {
            object.insert(
                "hexBackgroundColor".into(),
                json!(template.style.background_color),
            );
        }
        if !template.locations.is_empty() {
            let locations: Vec<Value> = template
                .locations
                .iter()
                .map(|l| json!({"latitude": l.latitude, "longitude": l.longitude}))
                .collect();
            object.insert("locations".into(), json!(locations));
        }

        Ok(Value::Object(object))
    }

    async fn send(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let bearer = self.auth.bearer(&self.client).await?;
        self.client
            .send(self.client.request(method, path).bearer_auth(bearer).json(body))
            .await
    }

    fn object_url(&self, kind: PassKind, object_id: &str) -> String {
        format!("{}{}", self.client.base_url(), self.object_path(kind, Some(object_id)))
    }

    /// Signed "save to wallet" link for an existing object.
    fn save_link(&self, account: &ServiceAccount, record: &PassRecord, template: &Template) -> Result<String> {
        let objects_key = format!("{}Objects", object_kind(template.kind));
        let jwt = account.sign_jwt(&json!({
            "iss": account.client_email(),
            "aud": "google",
            "typ": "savetowallet",
            "iat": Utc::now().timestamp(),
            "origins": self.origins,
            "payload": {
                objects_key: [{"id": record.pass_id, "classId": self.class_id(template)}],
            },
        }))?;
        Ok(format!("{}/{}", self.save_url, jwt))
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
    }

    fn pass_id(&self, serial_number: &str) -> String {
        format!("{}.{}", self.issuer_id, serial_number)
    }

    async fn create(&self, data: &PassData, template: &Template) -> Result<PassRecord> {
        let object_id = self.pass_id(&data.serial_number);
        let body = self.object(&object_id, data, template)?;

        match self
            .send(Method::POST, &self.object_path(template.kind, None), &body)
            .await
        {
            Ok(_) => info!(provider = %self.name, object_id = %object_id, "Created wallet object"),
            Err(e) if e.http_status() == Some(409) => {
                debug!(provider = %self.name, object_id = %object_id, "Wallet object exists, replacing");
                self.send(
                    Method::PUT,
                    &self.object_path(template.kind, Some(&object_id)),
                    &body,
                )
                .await?;
            }
            Err(e) => return Err(e),
        }

        Ok(PassRecord::new(&self.name, &object_id, data, template)
            .with_reference(self.object_url(template.kind, &object_id)))
    }

    async fn update(
        &self,
        record: &PassRecord,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord> {
        let body = self.object(&record.pass_id, data, template)?;
        self.send(
            Method::PUT,
            &self.object_path(template.kind, Some(&record.pass_id)),
            &body,
        )
        .await?;
        Ok(record.with_data(data, template))
    }

    async fn void(&self, record: &PassRecord, template: &Template) -> Result<PassRecord> {
        self.send(
            Method::PATCH,
            &self.object_path(template.kind, Some(&record.pass_id)),
            &json!({"state": "INACTIVE"}),
        )
        .await?;
        Ok(record.voided())
    }

    async fn generate_artifact(&self, record: &PassRecord, template: &Template) -> Result<Artifact> {
        if let Some(account) = self.auth.account() {
            return Ok(Artifact::Reference(self.save_link(account, record, template)?));
        }
        Ok(Artifact::Reference(record.reference.clone().unwrap_or_else(
            || self.object_url(template.kind, &record.pass_id),
        )))
    }

    async fn notify(&self, record: &PassRecord) -> Result<bool> {
        // Holders' devices sync object changes on their own.
        debug!(provider = %self.name, pass_id = %record.pass_id, "Google Wallet syncs updates itself");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use std::time::Duration;

    fn provider() -> GoogleProvider {
        let client = ApiClient::new("google", "http://localhost:1", Duration::from_secs(1)).unwrap();
        GoogleProvider::new("google", "3388", client, GoogleAuth::Static(AccessToken::new("t")))
    }

    #[test]
    fn test_object_body() {
        let template = presets::event_ticket("Gala", "org").unwrap();
        let data = PassData::new(&template.id, "c1")
            .with_serial_number("S1")
            .with_field("event_date", "2025-06-01")
            .with_barcode("T1", Some("Ticket 1"));

        let object = provider().object("3388.S1", &data, &template).unwrap();
        assert_eq!(object["classId"], "3388.gala");
        assert_eq!(object["state"], "ACTIVE");
        assert_eq!(object["barcode"]["type"], "QR_CODE");
        assert_eq!(object["barcode"]["alternateText"], "Ticket 1");
        assert_eq!(object["hexBackgroundColor"], "#FFFFFF");
        assert_eq!(object["textModulesData"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_paths_follow_kind() {
        let provider = provider();
        assert_eq!(provider.object_path(PassKind::Coupon, None), "/offerObject");
        assert_eq!(
            provider.object_path(PassKind::EventTicket, Some("3388.S1")),
            "/eventTicketObject/3388.S1"
        );
        assert_eq!(provider.pass_id("S1"), "3388.S1");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = Config::new(ProviderType::Google).with_option("issuer_id", "3388");
        let err = GoogleProvider::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("access_token"));
    }
}
