//! Apple Wallet provider implementation.

use super::PushDispatcher;
use crate::archive::{ArchiveBuilder, ArchiveSettings, DigestAlgorithm, SigningCredentials};
use crate::config::ProviderType;
use crate::{Artifact, Config, PassData, PassRecord, Provider, Result, Template};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Apple Wallet provider.
///
/// Holds an [`ArchiveBuilder`] (and through it the shared signing
/// credentials) plus an optional [`PushDispatcher`].
pub struct AppleProvider {
    name: String,
    builder: ArchiveBuilder,
    dispatcher: Option<Arc<dyn PushDispatcher>>,
}

impl AppleProvider {
    pub fn new(name: impl Into<String>, builder: ArchiveBuilder) -> Self {
        Self {
            name: name.into(),
            builder,
            dispatcher: None,
        }
    }

    /// Creates the provider from configuration, loading the signing
    /// credentials from disk.
    ///
    /// # Errors
    ///
    /// - [`WalletError::Configuration`](crate::WalletError::Configuration):
    ///   a required option is missing or `manifest_digest` is unknown
    /// - [`WalletError::Signing`](crate::WalletError::Signing): the
    ///   credentials cannot be loaded or do not belong together
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut settings = ArchiveSettings::new(
            config.require_option("pass_type_identifier")?,
            config.require_option("team_identifier")?,
        );
        if let Some(name) = config.get_option("organization_name") {
            settings = settings.with_organization_name(name);
        }
        if let Some(url) = config.get_option("web_service_url") {
            settings = settings.with_web_service_url(url);
        }
        if let Some(digest) = config.get_option("manifest_digest") {
            settings = settings.with_digest(digest.parse::<DigestAlgorithm>()?);
        }

        let credentials = SigningCredentials::from_files(
            config.require_option("certificate_path")?,
            config.require_option("private_key_path")?,
            config.require_option("trust_chain_path")?,
        )?;
        debug!(provider = %config.provider_name(), credentials = ?credentials, "Loaded signing credentials");

        Ok(Self::new(
            config.provider_name(),
            ArchiveBuilder::new(settings, Arc::new(credentials)),
        ))
    }

    /// Routes update notifications through `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn PushDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn builder(&self) -> &ArchiveBuilder {
        &self.builder
    }

    fn download_url(&self, pass_id: &str) -> Option<String> {
        self.builder
            .settings()
            .web_service_url
            .as_ref()
            .map(|url| format!("{}/passes/{}", url, pass_id))
    }
}

#[async_trait]
impl Provider for AppleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Apple
    }

    fn pass_id(&self, serial_number: &str) -> String {
        format!("{}.{}", self.builder.settings().pass_type_identifier, serial_number)
    }

    async fn create(&self, data: &PassData, template: &Template) -> Result<PassRecord> {
        let token = Uuid::new_v4().simple().to_string();
        let archive = self.builder.build(template, data, Some(&token))?;

        let pass_id = self.pass_id(&data.serial_number);
        let mut record = PassRecord::new(&self.name, &pass_id, data, template);
        record.authentication_token = Some(token);
        record.reference = self.download_url(&pass_id);

        info!(provider = %self.name, pass_id = %pass_id, bytes = archive.len(), "Built pass archive");
        Ok(record)
    }

    async fn update(
        &self,
        record: &PassRecord,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord> {
        let archive = self
            .builder
            .build(template, data, record.authentication_token.as_deref())?;
        debug!(provider = %self.name, pass_id = %record.pass_id, bytes = archive.len(), "Rebuilt pass archive");
        Ok(record.with_data(data, template))
    }

    async fn void(&self, record: &PassRecord, template: &Template) -> Result<PassRecord> {
        let next = record.voided();
        self.builder
            .build(template, &next.data, record.authentication_token.as_deref())?;
        Ok(next)
    }

    async fn generate_artifact(&self, record: &PassRecord, template: &Template) -> Result<Artifact> {
        let archive = self
            .builder
            .build(template, &record.data, record.authentication_token.as_deref())?;
        Ok(Artifact::Archive(archive))
    }

    async fn notify(&self, record: &PassRecord) -> Result<bool> {
        let Some(dispatcher) = &self.dispatcher else {
            warn!(provider = %self.name, pass_id = %record.pass_id, "No push dispatcher configured, skipping notification");
            return Ok(false);
        };
        dispatcher
            .push(
                &self.builder.settings().pass_type_identifier,
                &record.serial_number,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{builder, event_data, event_template};
    use crate::archive::{verify_archive, PassPackage};
    use std::sync::Mutex;

    fn provider() -> AppleProvider {
        let builder = builder();
        let settings = builder
            .settings()
            .clone()
            .with_web_service_url("https://passes.example.com/");
        AppleProvider::new("apple", ArchiveBuilder::new(settings, Arc::new(crate::archive::fixtures::credentials())))
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        pushed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushDispatcher for RecordingDispatcher {
        async fn push(&self, pass_type_identifier: &str, serial_number: &str) -> Result<bool> {
            self.pushed
                .lock()
                .unwrap()
                .push(format!("{}/{}", pass_type_identifier, serial_number));
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_create_records_token_and_download_url() {
        let provider = provider();
        let template = event_template();
        let record = provider.create(&event_data(&template), &template).await.unwrap();

        assert_eq!(record.pass_id, "pass.com.example.test.S1");
        assert_eq!(
            record.reference.as_deref(),
            Some("https://passes.example.com/passes/pass.com.example.test.S1")
        );
        assert_eq!(record.authentication_token.as_ref().map(String::len), Some(32));
    }

    #[tokio::test]
    async fn test_artifact_carries_token_and_verifies() {
        let provider = provider();
        let template = event_template();
        let record = provider.create(&event_data(&template), &template).await.unwrap();

        let artifact = provider.generate_artifact(&record, &template).await.unwrap();
        let bytes = artifact.as_archive().unwrap();
        verify_archive(bytes).unwrap();

        let pass = PassPackage::from_zip(bytes).unwrap().pass_json().unwrap();
        assert_eq!(
            pass["authenticationToken"].as_str(),
            record.authentication_token.as_deref()
        );
        assert_eq!(pass["webServiceURL"], "https://passes.example.com");
    }

    #[tokio::test]
    async fn test_voided_archive() {
        let provider = provider();
        let template = event_template();
        let record = provider.create(&event_data(&template), &template).await.unwrap();
        let voided = provider.void(&record, &template).await.unwrap();

        let artifact = provider.generate_artifact(&voided, &template).await.unwrap();
        let pass = PassPackage::from_zip(artifact.as_archive().unwrap())
            .unwrap()
            .pass_json()
            .unwrap();
        assert_eq!(pass["voided"], true);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_data() {
        let provider = provider();
        let template = event_template();
        let data = PassData::new(&template.id, "c1").with_barcode("T1", None);
        assert!(provider.create(&data, &template).await.is_err());
    }

    #[tokio::test]
    async fn test_notify_without_dispatcher() {
        let provider = provider();
        let template = event_template();
        let record = provider.create(&event_data(&template), &template).await.unwrap();
        assert!(!provider.notify(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_notify_with_dispatcher() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let provider = provider().with_dispatcher(dispatcher.clone());
        let template = event_template();
        let record = provider.create(&event_data(&template), &template).await.unwrap();

        assert!(provider.notify(&record).await.unwrap());
        assert_eq!(
            *dispatcher.pushed.lock().unwrap(),
            vec!["pass.com.example.test/S1".to_string()]
        );
    }

    #[test]
    fn test_from_config_requires_options() {
        let config = Config::new(ProviderType::Apple).with_option("pass_type_identifier", "pass.x");
        let err = AppleProvider::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(err.to_string().contains("team_identifier"));
    }

    #[test]
    fn test_from_config_loads_fixture_credentials() {
        let fixtures = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
        let config = Config::new(ProviderType::Apple)
            .with_name("apple-eu")
            .with_option("pass_type_identifier", "pass.com.example.test")
            .with_option("team_identifier", "ABCDE12345")
            .with_option("certificate_path", format!("{}/issuer.pem", fixtures))
            .with_option("private_key_path", format!("{}/issuer.key", fixtures))
            .with_option("trust_chain_path", format!("{}/trust_chain.pem", fixtures))
            .with_option("manifest_digest", "sha256");

        let provider = AppleProvider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "apple-eu");
        assert_eq!(provider.builder().settings().digest, DigestAlgorithm::Sha256);
    }
}
